//! Positional parameter lists.

use super::{Portable, TypeDesc};
use crate::{FarcallError, Result};
use serde_json::Value;

/// A tuple of method parameters.
///
/// Implemented for tuples of up to eight [`Portable`] values. Provides the
/// parameter types for signature encoding and the conversion to and from the
/// positional JSON argument list.
pub trait Params: Sized {
    fn param_types() -> Vec<TypeDesc>;

    fn into_values(self) -> Result<Vec<Value>>;

    fn from_values(values: Vec<Value>) -> Result<Self>;
}

fn decode_arg<T: Portable>(slot: Option<(usize, Value)>) -> Result<T> {
    let (position, value) = slot.ok_or_else(|| FarcallError::InvalidArguments {
        message: "argument list ended early".to_string(),
    })?;
    T::from_portable(value).map_err(|e| FarcallError::InvalidArguments {
        message: format!("argument {}: {}", position, e),
    })
}

macro_rules! impl_params {
    ($($ty:ident),*) => {
        impl<$($ty),*> Params for ($($ty,)*)
        where
            $($ty: Portable,)*
        {
            fn param_types() -> Vec<TypeDesc> {
                vec![$(<$ty as Portable>::type_desc()),*]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Result<Vec<Value>> {
                let ($($ty,)*) = self;
                Ok(vec![$($ty.to_portable()?),*])
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn from_values(values: Vec<Value>) -> Result<Self> {
                let expected = Self::param_types().len();
                if values.len() != expected {
                    return Err(FarcallError::InvalidArguments {
                        message: format!("expected {} arguments, got {}", expected, values.len()),
                    });
                }
                let mut slots = values.into_iter().enumerate();
                $(let $ty: $ty = decode_arg(slots.next())?;)*
                Ok(($($ty,)*))
            }
        }
    };
}

impl_params!();
impl_params!(A);
impl_params!(A, B);
impl_params!(A, B, C);
impl_params!(A, B, C, D);
impl_params!(A, B, C, D, E);
impl_params!(A, B, C, D, E, F);
impl_params!(A, B, C, D, E, F, G);
impl_params!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_types() {
        assert!(<()>::param_types().is_empty());
        let types = <(String, i32, Vec<bool>)>::param_types();
        let names: Vec<String> = types.iter().map(TypeDesc::portable_name).collect();
        assert_eq!(names, vec!["std::string::String", "int", "[boolean"]);
    }

    #[test]
    fn test_values_are_positional() {
        let values = ("Ann".to_string(), 3i32).into_values().unwrap();
        assert_eq!(values, vec![json!("Ann"), json!(3)]);

        let (name, count) = <(String, i32)>::from_values(values).unwrap();
        assert_eq!(name, "Ann");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_non_finite_floats_survive() {
        let values = (f64::NAN, f64::INFINITY, f32::NEG_INFINITY, 1.5f64)
            .into_values()
            .unwrap();
        assert_eq!(
            values,
            vec![json!("NaN"), json!("Infinity"), json!("-Infinity"), json!(1.5)]
        );

        let (nan, inf, neg, finite) = <(f64, f64, f32, f64)>::from_values(values).unwrap();
        assert!(nan.is_nan());
        assert_eq!(inf, f64::INFINITY);
        assert_eq!(neg, f32::NEG_INFINITY);
        assert_eq!(finite, 1.5);
    }

    #[test]
    fn test_non_finite_floats_inside_arrays_and_options() {
        let values = (vec![0.25f64, f64::NEG_INFINITY], Some(f64::NAN), None::<f64>)
            .into_values()
            .unwrap();
        assert_eq!(values[0], json!([0.25, "-Infinity"]));
        assert_eq!(values[1], json!("NaN"));
        assert_eq!(values[2], json!(null));

        let (list, some, none) = <(Vec<f64>, Option<f64>, Option<f64>)>::from_values(values).unwrap();
        assert_eq!(list, vec![0.25, f64::NEG_INFINITY]);
        assert!(some.unwrap().is_nan());
        assert!(none.is_none());
    }

    #[test]
    fn test_unknown_float_string_is_rejected() {
        let result = <(f64,)>::from_values(vec![json!("Inf")]);
        match result {
            Err(FarcallError::InvalidArguments { message }) => {
                assert!(message.starts_with("argument 0"), "{}", message)
            }
            other => panic!("Expected InvalidArguments, got: {:?}", other),
        }
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let result = <(i32,)>::from_values(vec![json!(1), json!(2)]);
        assert!(matches!(result, Err(FarcallError::InvalidArguments { .. })));
    }

    #[test]
    fn test_type_mismatch_names_the_position() {
        let result = <(i32, bool)>::from_values(vec![json!(1), json!("yes")]);
        match result {
            Err(FarcallError::InvalidArguments { message }) => {
                assert!(message.starts_with("argument 1"), "{}", message)
            }
            other => panic!("Expected InvalidArguments, got: {:?}", other),
        }
    }
}
