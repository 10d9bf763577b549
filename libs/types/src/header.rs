//! Header chain records
//!
//! A message payload may be preceded by a chain of self-describing headers. Four kinds
//! have a structured in-memory form ([`Rfh2Header`], [`RfhHeader`], [`CihHeader`],
//! [`IihHeader`]); every other recognized kind is identified by its [`HeaderKind`] only and
//! is dropped while decoding.

use crate::constants::{
    MQCCSI_INHERIT, MQCCSI_UTF8, MQENC_NATIVE, MQFMT_CICS, MQFMT_IMS, MQFMT_NONE,
    MQFMT_RF_HEADER, MQFMT_RF_HEADER_2,
};
use crate::field::Rfh2Field;
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every header kind the codec can recognize on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum HeaderKind {
    Rfh2,
    Rfh,
    Cih,
    Iih,
    Md,
    Mde,
    Rmh,
    Saph,
    Tm,
    Tm2,
    Tmc2,
    Wih,
    Xqh,
    Dlh,
    Dh,
    Eph,
}

impl HeaderKind {
    /// Four character structure identifier that opens the header on the wire
    pub fn struc_id(self) -> &'static [u8; 4] {
        match self {
            HeaderKind::Rfh2 | HeaderKind::Rfh => b"RFH ",
            HeaderKind::Cih => b"CIH ",
            HeaderKind::Iih => b"IIH ",
            HeaderKind::Md => b"MD  ",
            HeaderKind::Mde => b"MDE ",
            HeaderKind::Rmh => b"RMH ",
            HeaderKind::Saph => b"SAPH",
            HeaderKind::Tm => b"TM  ",
            HeaderKind::Tm2 => b"TM2 ",
            HeaderKind::Tmc2 => b"TMC2",
            HeaderKind::Wih => b"WIH ",
            HeaderKind::Xqh => b"XQH ",
            HeaderKind::Dlh => b"DLH ",
            HeaderKind::Dh => b"DH  ",
            HeaderKind::Eph => b"EPH ",
        }
    }

    /// Whether the kind has a structured in-memory representation
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            HeaderKind::Rfh2 | HeaderKind::Rfh | HeaderKind::Cih | HeaderKind::Iih
        )
    }

    /// Format name announcing this kind in the preceding descriptor or header
    pub fn format_name(self) -> Option<&'static str> {
        match self {
            HeaderKind::Rfh2 => Some(MQFMT_RF_HEADER_2),
            HeaderKind::Rfh => Some(MQFMT_RF_HEADER),
            HeaderKind::Cih => Some(MQFMT_CICS),
            HeaderKind::Iih => Some(MQFMT_IMS),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeaderKind::Rfh2 => "MQRFH2",
            HeaderKind::Rfh => "MQRFH",
            HeaderKind::Cih => "MQCIH",
            HeaderKind::Iih => "MQIIH",
            HeaderKind::Md => "MQMD",
            HeaderKind::Mde => "MQMDE",
            HeaderKind::Rmh => "MQRMH",
            HeaderKind::Saph => "MQSAPH",
            HeaderKind::Tm => "MQTM",
            HeaderKind::Tm2 => "MQTM2",
            HeaderKind::Tmc2 => "MQTMC2",
            HeaderKind::Wih => "MQWIH",
            HeaderKind::Xqh => "MQXQH",
            HeaderKind::Dlh => "MQDLH",
            HeaderKind::Dh => "MQDH",
            HeaderKind::Eph => "MQEPH",
        };
        f.write_str(name)
    }
}

/// One record of a header chain
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Header {
    Rfh2(Rfh2Header),
    Rfh(RfhHeader),
    Cih(CihHeader),
    Iih(IihHeader),
    /// A recognized kind without in-memory form; decode never yields it and encode rejects it
    Unsupported { header_kind: HeaderKind },
}

impl Header {
    pub fn kind(&self) -> HeaderKind {
        match self {
            Header::Rfh2(_) => HeaderKind::Rfh2,
            Header::Rfh(_) => HeaderKind::Rfh,
            Header::Cih(_) => HeaderKind::Cih,
            Header::Iih(_) => HeaderKind::Iih,
            Header::Unsupported { header_kind } => *header_kind,
        }
    }
}

/// Rules and formatting header, version 2
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct Rfh2Header {
    pub flags: i32,
    pub encoding: i32,
    pub coded_char_set_id: i32,
    pub format: String,
    pub name_value_ccsid: i32,
    /// Raw folder markup in wire order, padding removed
    pub folder_strings: Vec<String>,
    /// Leaf fields of every folder, in folder order then document order
    pub fields: Vec<Rfh2Field>,
}

impl Rfh2Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder_strings.push(folder.into());
        self
    }

    pub fn with_field(mut self, field: Rfh2Field) -> Self {
        self.fields.push(field);
        self
    }

    /// All values stored under `folder`/`field`, in table order
    pub fn field_values<'a>(
        &'a self,
        folder: &'a str,
        field: &'a str,
    ) -> impl Iterator<Item = &'a crate::FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.folder == folder && f.field == field)
            .map(|f| &f.value)
    }
}

impl Default for Rfh2Header {
    fn default() -> Self {
        Self {
            flags: 0,
            encoding: MQENC_NATIVE,
            coded_char_set_id: MQCCSI_INHERIT,
            format: MQFMT_NONE.to_string(),
            name_value_ccsid: MQCCSI_UTF8,
            folder_strings: Vec::new(),
            fields: Vec::new(),
        }
    }
}

/// Rules and formatting header, version 1
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct RfhHeader {
    pub flags: i32,
    pub encoding: i32,
    pub coded_char_set_id: i32,
    pub format: String,
    pub name_value_pairs: Vec<(String, String)>,
}

impl RfhHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.name_value_pairs.push((name.into(), value.into()));
        self
    }
}

impl Default for RfhHeader {
    fn default() -> Self {
        Self {
            flags: 0,
            encoding: MQENC_NATIVE,
            coded_char_set_id: MQCCSI_INHERIT,
            format: MQFMT_NONE.to_string(),
            name_value_pairs: Vec::new(),
        }
    }
}

/// CICS bridge header
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct CihHeader {
    /// 1 (164 bytes) or 2 (180 bytes)
    pub version: i32,
    pub flags: i32,
    pub encoding: i32,
    pub coded_char_set_id: i32,
    pub format: String,
    pub return_code: i32,
    pub comp_code: i32,
    pub reason: i32,
    pub uow_control: i32,
    pub get_wait_interval: i32,
    pub link_type: i32,
    pub output_data_length: i32,
    pub facility_keep_time: i32,
    pub ads_descriptor: i32,
    pub conversational_task: i32,
    pub task_end_status: i32,
    pub facility: [u8; 8],
    pub function: String,
    pub abend_code: String,
    pub authenticator: String,
    pub reserved1: String,
    pub reply_to_format: String,
    pub remote_sys_id: String,
    pub remote_trans_id: String,
    pub transaction_id: String,
    pub facility_like: String,
    pub attention_id: String,
    pub start_code: String,
    pub cancel_code: String,
    pub next_transaction_id: String,
    pub reserved2: String,
    pub reserved3: String,
    // Version 2 only
    pub cursor_position: i32,
    pub error_offset: i32,
    pub input_item: i32,
    pub reserved4: i32,
}

impl Default for CihHeader {
    fn default() -> Self {
        Self {
            version: 2,
            flags: 0,
            encoding: 0,
            coded_char_set_id: 0,
            format: MQFMT_NONE.to_string(),
            return_code: 0,
            comp_code: 0,
            reason: 0,
            uow_control: 0x111,
            get_wait_interval: -2,
            link_type: 1,
            output_data_length: -1,
            facility_keep_time: 0,
            ads_descriptor: 0,
            conversational_task: 0,
            task_end_status: 0,
            facility: [0; 8],
            function: String::new(),
            abend_code: String::new(),
            authenticator: String::new(),
            reserved1: String::new(),
            reply_to_format: String::new(),
            remote_sys_id: String::new(),
            remote_trans_id: String::new(),
            transaction_id: String::new(),
            facility_like: String::new(),
            attention_id: String::new(),
            start_code: String::new(),
            cancel_code: String::new(),
            next_transaction_id: String::new(),
            reserved2: String::new(),
            reserved3: String::new(),
            cursor_position: 0,
            error_offset: 0,
            input_item: 0,
            reserved4: 0,
        }
    }
}

/// IMS information header
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct IihHeader {
    pub flags: i32,
    pub encoding: i32,
    pub coded_char_set_id: i32,
    pub format: String,
    pub l_term_override: String,
    pub mfs_map_name: String,
    pub reply_to_format: String,
    pub authenticator: String,
    pub tran_instance_id: [u8; 16],
    pub tran_state: char,
    pub commit_mode: char,
    pub security_scope: char,
    pub reserved: char,
}

impl Default for IihHeader {
    fn default() -> Self {
        Self {
            flags: 0,
            encoding: 0,
            coded_char_set_id: 0,
            format: MQFMT_NONE.to_string(),
            l_term_override: String::new(),
            mfs_map_name: String::new(),
            reply_to_format: String::new(),
            authenticator: String::new(),
            tran_instance_id: [0; 16],
            tran_state: ' ',
            commit_mode: '0',
            security_scope: 'C',
            reserved: ' ',
        }
    }
}
