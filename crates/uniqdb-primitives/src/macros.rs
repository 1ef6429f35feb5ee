#[macro_export]
macro_rules! value_kind_registry_entries {
    ($macro:ident $(, @args $($args:tt)+ )?) => {
        $macro! {
            $(
                @args $($args)+;
            )?
            @entries
            (Int8, Integer, name = "Int8", fixed_width = Some(1), key_width = Narrow),
            (Int16, Integer, name = "Int16", fixed_width = Some(2), key_width = Narrow),
            (Int32, Integer, name = "Int32", fixed_width = Some(4), key_width = Narrow),
            (Int64, Integer, name = "Int64", fixed_width = Some(8), key_width = Narrow),
            (Int128, Integer, name = "Int128", fixed_width = Some(16), key_width = Wide),
            (UInt8, Integer, name = "UInt8", fixed_width = Some(1), key_width = Narrow),
            (UInt16, Integer, name = "UInt16", fixed_width = Some(2), key_width = Narrow),
            (UInt32, Integer, name = "UInt32", fixed_width = Some(4), key_width = Narrow),
            (UInt64, Integer, name = "UInt64", fixed_width = Some(8), key_width = Narrow),
            (UInt128, Integer, name = "UInt128", fixed_width = Some(16), key_width = Wide),
            (Float32, Float, name = "Float32", fixed_width = Some(4), key_width = Narrow),
            (Float64, Float, name = "Float64", fixed_width = Some(8), key_width = Narrow),
            (Text, Text, name = "String", fixed_width = None, key_width = Wide),
        }
    };
}

#[macro_export]
macro_rules! value_kind_registry {
    ($macro:ident) => {
        $crate::value_kind_registry_entries!($macro)
    };
    ($macro:ident, $($args:tt)+) => {
        $crate::value_kind_registry_entries!($macro, @args $($args)+)
    };
}

macro_rules! metadata_from_registry {
    ( @args $kind:expr; @entries $( ($value:ident, $family:ident, name = $name:expr, fixed_width = $fixed_width:expr, key_width = $key_width:ident) ),* $(,)? ) => {
        match $kind {
            $(
                $crate::ValueKind::$value => $crate::ValueMetadata {
                    family: $crate::ValueFamily::$family,
                    name: $name,
                    fixed_width: $fixed_width,
                    key_width: $crate::KeyWidth::$key_width,
                },
            )*
        }
    };
}

macro_rules! all_kinds_from_registry {
    ( @entries $( ($value:ident, $family:ident, name = $name:expr, fixed_width = $fixed_width:expr, key_width = $key_width:ident) ),* $(,)? ) => {
        [ $( $crate::ValueKind::$value ),* ]
    };
}
