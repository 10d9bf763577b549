//! Middleware constants used by the message model and the wire codec
//!
//! Values match the published MQI constant tables so that buffers produced here
//! are accepted by unmodified queue managers and clients.

// Encoding
pub const MQENC_INTEGER_MASK: i32 = 0x0000_000F;
pub const MQENC_INTEGER_NORMAL: i32 = 0x0000_0001;
pub const MQENC_INTEGER_REVERSED: i32 = 0x0000_0002;
/// Native encoding of a JVM-hosted client: normal integers, normal decimals, IEEE float
pub const MQENC_NATIVE: i32 = 0x0000_0111;
pub const MQENC_REVERSED: i32 = 0x0000_0222;

// Coded character set identifiers
pub const MQCCSI_Q_MGR: i32 = 0;
pub const MQCCSI_INHERIT: i32 = -2;
pub const MQCCSI_UTF8: i32 = 1208;

// Formats (always 8 characters on the wire)
pub const MQFMT_NONE: &str = "";
pub const MQFMT_STRING: &str = "MQSTR";
pub const MQFMT_RF_HEADER: &str = "MQHRF";
pub const MQFMT_RF_HEADER_2: &str = "MQHRF2";
pub const MQFMT_CICS: &str = "MQCICS";
pub const MQFMT_IMS: &str = "MQIMS";
pub const FORMAT_LENGTH: usize = 8;

// Descriptor defaults
pub const MQEI_UNLIMITED: i32 = -1;
pub const MQPRI_PRIORITY_AS_Q_DEF: i32 = -1;
pub const MQPER_PERSISTENCE_AS_Q_DEF: i32 = 2;
pub const MQMT_DATAGRAM: i32 = 8;
pub const MQAT_NO_CONTEXT: i32 = 0;

// Property descriptor defaults
pub const MQPD_VERSION_1: i32 = 1;
pub const MQCOPY_DEFAULT: i32 = 0x16;
pub const MQPD_NONE: i32 = 0;
pub const MQPD_SUPPORT_OPTIONAL: i32 = 0x0000_0001;
pub const MQPD_NO_CONTEXT: i32 = 0;

// Reason codes
pub const MQRC_NONE: i32 = 0;
pub const MQRC_NO_MSG_AVAILABLE: i32 = 2033;

// Get message options
pub const MQGMO_NO_WAIT: i32 = 0x0000_0000;
pub const MQGMO_WAIT: i32 = 0x0000_0001;
pub const MQGMO_SYNCPOINT: i32 = 0x0000_0002;
pub const MQGMO_NO_SYNCPOINT: i32 = 0x0000_0004;
pub const MQGMO_CONVERT: i32 = 0x0000_4000;

// Match options
pub const MQMO_NONE: i32 = 0x0000_0000;
pub const MQMO_MATCH_MSG_ID: i32 = 0x0000_0001;
pub const MQMO_MATCH_CORREL_ID: i32 = 0x0000_0002;

// Put message options
pub const MQPMO_SYNCPOINT: i32 = 0x0000_0002;
pub const MQPMO_NO_SYNCPOINT: i32 = 0x0000_0004;
