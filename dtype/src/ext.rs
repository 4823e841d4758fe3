use super::*;

/// Rust types with a fixed device element type.
pub trait HasDType {
    const DTYPE: DType;
}

macro_rules! impl_dtype_ext {
    ($($ty:ty => $scalar:expr),* $(,)?) => {
        $(
            impl HasDType for $ty {
                const DTYPE: DType = DType::Scalar($scalar);
            }

            impl HasDType for [$ty; 2] {
                const DTYPE: DType = DType::Vector { scalar: $scalar, count: 2 };
            }
        )*
    };
}

impl_dtype_ext! {
    bool => ScalarDType::Bool,
    i8 => ScalarDType::Int8, i16 => ScalarDType::Int16, i32 => ScalarDType::Int32, i64 => ScalarDType::Int64,
    u8 => ScalarDType::UInt8, u16 => ScalarDType::UInt16, u32 => ScalarDType::UInt32, u64 => ScalarDType::UInt64,
    f32 => ScalarDType::Float32, f64 => ScalarDType::Float64,
}
