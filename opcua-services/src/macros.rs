/// Declare a structure whose binary encoding is its fields in order
macro_rules! ua_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$field_meta:meta])* pub $field:ident: $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $($(#[$field_meta])* pub $field: $ty),*
        }

        impl opcua_codec::BinaryEncodable for $name {
            fn encode(&self, encoder: &mut opcua_codec::BinaryEncoder) -> opcua_core::UaResult<()> {
                $(encoder.encode(&self.$field)?;)*
                Ok(())
            }

            fn decode(decoder: &mut opcua_codec::BinaryDecoder<'_>) -> opcua_core::UaResult<Self> {
                Ok(Self {
                    $($field: decoder.decode()?),*
                })
            }
        }
    };
}

/// Declare an Int32-encoded enumeration
macro_rules! ua_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $value:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$variant_meta])* $variant = $value),*
        }

        impl $name {
            pub fn from_i32(value: i32) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)*
                    _ => None,
                }
            }
        }

        impl opcua_codec::BinaryEncodable for $name {
            fn encode(&self, encoder: &mut opcua_codec::BinaryEncoder) -> opcua_core::UaResult<()> {
                encoder.encode_i32(*self as i32)
            }

            fn decode(decoder: &mut opcua_codec::BinaryDecoder<'_>) -> opcua_core::UaResult<Self> {
                let value = decoder.decode_i32()?;
                Self::from_i32(value).ok_or_else(|| {
                    opcua_core::UaError::Decoding(format!(
                        "Invalid {} value: {}",
                        stringify!($name),
                        value
                    ))
                })
            }
        }
    };
}
