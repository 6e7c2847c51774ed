//! Portable method signatures.
//!
//! A signature is the ordered list of a method's parameter types, each
//! written as a portable name:
//!
//! ```text
//! int boolean byte short long double float char   primitives
//! std::string::String                              qualified names
//! [int  [[boolean  [std::string::String            arrays, one '[' per dimension
//! ```
//!
//! Encoding is total and invertible: [`TypeDesc::parse`] of
//! [`TypeDesc::portable_name`] gives back the same descriptor, so a method
//! can be found again from its encoded signature with [`resolve`].

mod params;

pub use params::Params;

use crate::reflection::{Instance, MethodHandle, ReflectionIndex};
use crate::{FarcallError, Result};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Primitive parameter types with fixed keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Boolean,
    Byte,
    Short,
    Long,
    Double,
    Float,
    Char,
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::Int,
        Primitive::Boolean,
        Primitive::Byte,
        Primitive::Short,
        Primitive::Long,
        Primitive::Double,
        Primitive::Float,
        Primitive::Char,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Short => "short",
            Primitive::Long => "long",
            Primitive::Double => "double",
            Primitive::Float => "float",
            Primitive::Char => "char",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == s)
    }
}

const VOID: &str = "void";
const ARRAY_PREFIX: char = '[';

/// Descriptor of one parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// No value; only valid as a return type.
    Void,
    Primitive(Primitive),
    /// A qualified type name. Never empty, never a primitive keyword, never
    /// starting with `[`.
    Named(String),
    /// `dims`-dimensional array of a non-array element.
    Array { element: Box<TypeDesc>, dims: usize },
}

impl TypeDesc {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(
            !name.is_empty()
                && !name.starts_with(ARRAY_PREFIX)
                && name != VOID
                && Primitive::from_keyword(&name).is_none(),
            "reserved or empty type name: {name:?}"
        );
        TypeDesc::Named(name)
    }

    /// One more array dimension over `element`.
    pub fn array_of(element: TypeDesc) -> Self {
        match element {
            TypeDesc::Array { element, dims } => TypeDesc::Array {
                element,
                dims: dims + 1,
            },
            other => TypeDesc::Array {
                element: Box::new(other),
                dims: 1,
            },
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDesc::Void)
    }

    /// The portable name of this type.
    pub fn portable_name(&self) -> String {
        match self {
            TypeDesc::Void => VOID.to_string(),
            TypeDesc::Primitive(p) => p.keyword().to_string(),
            TypeDesc::Named(name) => name.clone(),
            TypeDesc::Array { element, dims } => {
                let mut out = String::with_capacity(dims + 16);
                for _ in 0..*dims {
                    out.push(ARRAY_PREFIX);
                }
                out.push_str(&element.portable_name());
                out
            }
        }
    }

    /// Parse a portable name back into a descriptor.
    pub fn parse(entry: &str) -> Result<Self> {
        let element = entry.trim_start_matches(ARRAY_PREFIX);
        let dims = entry.len() - element.len();

        let invalid = |reason: &str| FarcallError::InvalidSignature {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        if element.is_empty() {
            return Err(invalid("missing type name"));
        }
        if element.trim() != element {
            return Err(invalid("surrounding whitespace"));
        }

        let base = if element == VOID {
            if dims > 0 {
                return Err(invalid("array of void"));
            }
            TypeDesc::Void
        } else if let Some(p) = Primitive::from_keyword(element) {
            TypeDesc::Primitive(p)
        } else {
            TypeDesc::Named(element.to_string())
        };

        Ok(if dims == 0 {
            base
        } else {
            TypeDesc::Array {
                element: Box::new(base),
                dims,
            }
        })
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.portable_name())
    }
}

/// Encoded parameter list of a method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(Vec<String>);

impl Signature {
    /// Encode a parameter list.
    pub fn encode(params: &[TypeDesc]) -> Self {
        Signature(params.iter().map(TypeDesc::portable_name).collect())
    }

    /// Decode every entry. `void` is rejected as a parameter type.
    pub fn decode(&self) -> Result<Vec<TypeDesc>> {
        self.0
            .iter()
            .map(|entry| {
                let desc = TypeDesc::parse(entry)?;
                if desc.is_void() {
                    return Err(FarcallError::InvalidSignature {
                        entry: entry.clone(),
                        reason: "void is not a parameter type".to_string(),
                    });
                }
                Ok(desc)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Signature {
    fn from(entries: Vec<String>) -> Self {
        Signature(entries)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Name, parameter types and return type of one method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<TypeDesc>,
    pub returns: TypeDesc,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<TypeDesc>, returns: TypeDesc) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
        }
    }

    /// Descriptor for a method taking `P` and returning `R`.
    pub fn of<P: Params, R: Portable>(name: impl Into<String>) -> Self {
        Self::new(name, P::param_types(), R::type_desc())
    }

    pub fn signature(&self) -> Signature {
        Signature::encode(&self.params)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{}", self.returns, self.name, self.signature())
    }
}

/// Encode a method's parameter list.
pub fn encode(method: &MethodDescriptor) -> Signature {
    method.signature()
}

/// Resolve an encoded signature to a method on the target's concrete type.
///
/// The per-type index is built on first use and cached in `index`. The
/// return type hint is consulted only when several methods share the name
/// and parameter list.
pub fn resolve(
    index: &ReflectionIndex,
    target: &Instance,
    return_hint: &str,
    method: &str,
    signature: &Signature,
) -> Result<MethodHandle> {
    let params = signature.decode()?;
    index
        .type_index(target)
        .get_method(return_hint, method, &params)
        .ok_or_else(|| FarcallError::MethodNotFound {
            type_name: target.type_name().to_string(),
            method: method.to_string(),
            signature: signature.to_string(),
        })
}

/// Types with a portable name and a JSON value encoding.
///
/// User types that travel as parameters or results implement this with a
/// qualified name. The value encoding defaults to serde:
///
/// ```rust
/// use farcall::signature::{Portable, TypeDesc};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Greeting {
///     text: String,
/// }
///
/// impl Portable for Greeting {
///     fn type_desc() -> TypeDesc {
///         TypeDesc::named("demo::Greeting")
///     }
/// }
/// ```
pub trait Portable: Serialize + DeserializeOwned {
    fn type_desc() -> TypeDesc;

    /// Encode as a JSON value.
    fn to_portable(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Decode from a JSON value produced by [`Portable::to_portable`].
    fn from_portable(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

const NAN: &str = "NaN";
const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

/// JSON numbers cannot hold NaN or the infinities; those travel as strings.
fn float_to_portable(value: f64) -> Value {
    if value.is_nan() {
        Value::from(NAN)
    } else if value.is_infinite() {
        Value::from(if value > 0.0 { INFINITY } else { NEG_INFINITY })
    } else {
        Value::from(value)
    }
}

fn float_from_portable(value: Value) -> serde_json::Result<f64> {
    match value {
        Value::String(s) => match s.as_str() {
            NAN => Ok(f64::NAN),
            INFINITY => Ok(f64::INFINITY),
            NEG_INFINITY => Ok(f64::NEG_INFINITY),
            other => Err(de::Error::custom(format!(
                "invalid floating point value {:?}",
                other
            ))),
        },
        other => serde_json::from_value(other),
    }
}

macro_rules! impl_portable_primitive {
    ($($ty:ty => $prim:ident),* $(,)?) => {
        $(
            impl Portable for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::Primitive(Primitive::$prim)
                }
            }
        )*
    };
}

impl_portable_primitive! {
    i32 => Int,
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    i64 => Long,
    char => Char,
}

impl Portable for f64 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Primitive(Primitive::Double)
    }

    fn to_portable(&self) -> serde_json::Result<Value> {
        Ok(float_to_portable(*self))
    }

    fn from_portable(value: Value) -> serde_json::Result<Self> {
        float_from_portable(value)
    }
}

impl Portable for f32 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Primitive(Primitive::Float)
    }

    fn to_portable(&self) -> serde_json::Result<Value> {
        Ok(float_to_portable(f64::from(*self)))
    }

    fn from_portable(value: Value) -> serde_json::Result<Self> {
        float_from_portable(value).map(|v| v as f32)
    }
}

impl Portable for () {
    fn type_desc() -> TypeDesc {
        TypeDesc::Void
    }
}

impl Portable for String {
    fn type_desc() -> TypeDesc {
        TypeDesc::named("std::string::String")
    }
}

impl Portable for Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::named("serde_json::Value")
    }
}

impl<T: Portable> Portable for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::named(format!(
            "std::option::Option<{}>",
            T::type_desc().portable_name()
        ))
    }

    fn to_portable(&self) -> serde_json::Result<Value> {
        match self {
            Some(inner) => inner.to_portable(),
            None => Ok(Value::Null),
        }
    }

    fn from_portable(value: Value) -> serde_json::Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_portable(other).map(Some),
        }
    }
}

impl<T: Portable> Portable for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::array_of(T::type_desc())
    }

    fn to_portable(&self) -> serde_json::Result<Value> {
        self.iter()
            .map(T::to_portable)
            .collect::<serde_json::Result<Vec<Value>>>()
            .map(Value::Array)
    }

    fn from_portable(value: Value) -> serde_json::Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_portable).collect(),
            other => serde_json::from_value(other),
        }
    }
}

impl Portable for Signature {
    fn type_desc() -> TypeDesc {
        Vec::<String>::type_desc()
    }
}
