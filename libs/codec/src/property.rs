//! Typed message property codec
//!
//! Properties do not live in the data buffer; the client library keeps them beside it and
//! exposes a name enumeration plus typed accessors. [`PropertyStore`] is that surface.
//! Decoding widens 32-bit integers to 64 bits, encoding narrows them back, and native
//! values with no application-level variant round-trip as [`PropertyValue::Opaque`] on
//! the way in and are left out on the way out.

use crate::error::{ProtocolError, ProtocolResult};
use tracing::debug;
use types::{
    NativeValue, Property, PropertyDescriptor, PropertySet, PropertyValue, RawMessage,
    StoredProperty,
};

/// Property access exposed by a message of the underlying client library
pub trait PropertyStore {
    /// Names of all properties, in the order the store keeps them
    fn property_names(&self) -> Vec<String>;

    fn get_property(&self, name: &str) -> ProtocolResult<(NativeValue, PropertyDescriptor)>;

    fn set_int_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: i32) -> ProtocolResult<()>;
    fn set_boolean_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: bool) -> ProtocolResult<()>;
    fn set_byte_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: i8) -> ProtocolResult<()>;
    fn set_bytes_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: &[u8]) -> ProtocolResult<()>;
    fn set_float_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: f32) -> ProtocolResult<()>;
    fn set_double_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: f64) -> ProtocolResult<()>;
    fn set_string_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: &str) -> ProtocolResult<()>;
}

fn store(
    message: &mut RawMessage,
    name: &str,
    descriptor: &PropertyDescriptor,
    value: NativeValue,
) -> ProtocolResult<()> {
    if name.is_empty() {
        return Err(ProtocolError::invalid_property(name, "property name is empty"));
    }
    message.put_property(StoredProperty {
        name: name.to_string(),
        value,
        descriptor: *descriptor,
    });
    Ok(())
}

impl PropertyStore for RawMessage {
    fn property_names(&self) -> Vec<String> {
        self.properties().iter().map(|p| p.name.clone()).collect()
    }

    fn get_property(&self, name: &str) -> ProtocolResult<(NativeValue, PropertyDescriptor)> {
        self.property(name)
            .map(|p| (p.value.clone(), p.descriptor))
            .ok_or_else(|| ProtocolError::invalid_property(name, "no such property"))
    }

    fn set_int_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: i32) -> ProtocolResult<()> {
        store(self, name, descriptor, NativeValue::Int(value))
    }

    fn set_boolean_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: bool) -> ProtocolResult<()> {
        store(self, name, descriptor, NativeValue::Bool(value))
    }

    fn set_byte_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: i8) -> ProtocolResult<()> {
        store(self, name, descriptor, NativeValue::Byte(value))
    }

    fn set_bytes_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: &[u8]) -> ProtocolResult<()> {
        store(self, name, descriptor, NativeValue::Bytes(value.to_vec()))
    }

    fn set_float_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: f32) -> ProtocolResult<()> {
        store(self, name, descriptor, NativeValue::Float(value))
    }

    fn set_double_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: f64) -> ProtocolResult<()> {
        store(self, name, descriptor, NativeValue::Double(value))
    }

    fn set_string_property(&mut self, name: &str, descriptor: &PropertyDescriptor, value: &str) -> ProtocolResult<()> {
        store(self, name, descriptor, NativeValue::String(value.to_string()))
    }
}

fn classify(native: NativeValue) -> PropertyValue {
    match native {
        NativeValue::Int(v) => PropertyValue::Int(i64::from(v)),
        NativeValue::Long(v) => PropertyValue::Int(v),
        NativeValue::Bool(v) => PropertyValue::Bool(v),
        NativeValue::Byte(v) => PropertyValue::Byte(v),
        NativeValue::Bytes(v) => PropertyValue::Bytes(v),
        NativeValue::Float(v) => PropertyValue::Float(v),
        NativeValue::Double(v) => PropertyValue::Double(v),
        NativeValue::String(v) => PropertyValue::String(v),
        other @ (NativeValue::Short(_) | NativeValue::Char(_)) => PropertyValue::Opaque(other),
    }
}

/// Read every property of `store`
///
/// Descriptors equal to the library default are reported as absent, so a property set
/// built without descriptors decodes back to itself.
pub fn decode_properties<S: PropertyStore + ?Sized>(store: &S) -> ProtocolResult<PropertySet> {
    let mut properties = PropertySet::new();
    for name in store.property_names() {
        let (native, descriptor) = store.get_property(&name)?;
        let descriptor = (descriptor != PropertyDescriptor::default()).then_some(descriptor);
        properties.insert(
            name,
            Property {
                value: classify(native),
                descriptor,
            },
        );
    }
    Ok(properties)
}

/// Write every property through the typed setters of `store`
pub fn encode_properties<S: PropertyStore + ?Sized>(properties: &PropertySet, store: &mut S) -> ProtocolResult<()> {
    for (name, property) in properties {
        let descriptor = property.effective_descriptor();
        match &property.value {
            PropertyValue::Int(v) => store.set_int_property(name, &descriptor, *v as i32)?,
            PropertyValue::Bool(v) => store.set_boolean_property(name, &descriptor, *v)?,
            PropertyValue::Byte(v) => store.set_byte_property(name, &descriptor, *v)?,
            PropertyValue::Bytes(v) => store.set_bytes_property(name, &descriptor, v)?,
            PropertyValue::Float(v) => store.set_float_property(name, &descriptor, *v)?,
            PropertyValue::Double(v) => store.set_double_property(name, &descriptor, *v)?,
            PropertyValue::String(v) => store.set_string_property(name, &descriptor, v)?,
            PropertyValue::Opaque(native) => {
                debug!(property = %name, value = ?native, "Skipping property with no typed setter");
            }
        }
    }
    Ok(())
}
