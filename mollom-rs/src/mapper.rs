//! Response mapping
//!
//! Turns a [`WireNode`] tree into typed values. Every target struct carries an
//! explicit [`TypeDescriptor`], generated by [`wire_object!`](crate::wire_object)
//! and built once per type, listing the wire names and kinds of its fields.
//! Enumerations are declared with [`wire_enum!`](crate::wire_enum).
//!
//! Decoding rules:
//!
//! - a declared field with no node in the payload keeps its default
//! - enum values are matched after normalizing case and separators; an
//!   unknown value leaves the field unset
//! - a node of the wrong shape (a scalar where an object is expected, say)
//!   fails the whole decode with [`MollomError::MalformedResponse`]

use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::{MollomError, Result};
use crate::wire::WireNode;

/// Declared type of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Bool,
    Int,
    Double,
}

/// Declared type of a field, as recorded in a [`TypeDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Enum(&'static str),
    Object(&'static str),
    Array(Box<FieldKind>),
    Optional(Box<FieldKind>),
    /// Raw node, kept as-is
    Any,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(ScalarKind::String) => write!(f, "string"),
            FieldKind::Scalar(ScalarKind::Bool) => write!(f, "boolean"),
            FieldKind::Scalar(ScalarKind::Int) => write!(f, "integer"),
            FieldKind::Scalar(ScalarKind::Double) => write!(f, "double"),
            FieldKind::Enum(name) => write!(f, "enum {}", name),
            FieldKind::Object(name) => write!(f, "object {}", name),
            FieldKind::Array(inner) => write!(f, "array of {}", inner),
            FieldKind::Optional(inner) => write!(f, "optional {}", inner),
            FieldKind::Any => write!(f, "any value"),
        }
    }
}

/// A type that can be decoded from a wire node
pub trait FromWire: Sized {
    /// Declared kind of this type
    fn kind() -> FieldKind;

    /// Decode a node.
    ///
    /// `Ok(None)` means "leave the destination at its default": the node is
    /// nil, or an enum value matched no variant.
    fn from_wire(node: &WireNode) -> Result<Option<Self>>;
}

/// Applies a decoded node to one field of `T`
pub type FieldSetter<T> = fn(&mut T, &WireNode) -> Result<()>;

/// Description of one field of a target type
pub struct FieldDescriptor<T> {
    names: &'static [&'static str],
    kind: FieldKind,
    apply: FieldSetter<T>,
}

impl<T> FieldDescriptor<T> {
    pub fn new(names: &'static [&'static str], kind: FieldKind, apply: FieldSetter<T>) -> Self {
        Self { names, kind, apply }
    }

    /// Wire names accepted for this field, in lookup order
    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    fn lookup<'a>(&self, map: &'a BTreeMap<String, WireNode>) -> Option<&'a WireNode> {
        self.names.iter().find_map(|name| map.get(*name))
    }
}

/// Description of a target type: its name and declared fields
pub struct TypeDescriptor<T> {
    name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> TypeDescriptor<T> {
    pub fn new(name: &'static str, fields: Vec<FieldDescriptor<T>>) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Find a field by any of its wire names
    pub fn field(&self, wire_name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|f| f.names.contains(&wire_name))
    }
}

/// A struct decoded field-by-field from a map node
pub trait WireObject: Default + 'static {
    fn descriptor() -> &'static TypeDescriptor<Self>;
}

/// An enumeration decoded from a string node
pub trait WireEnum: Copy + 'static {
    const NAME: &'static str;
    /// Each variant with its canonical wire name
    const VARIANTS: &'static [(Self, &'static str)];

    /// Canonical wire name of this variant
    fn as_wire_str(&self) -> &'static str;

    fn from_wire_str(value: &str) -> Option<Self> {
        let wanted = normalize_enum_name(value);
        Self::VARIANTS
            .iter()
            .find(|(_, wire)| normalize_enum_name(wire) == wanted)
            .map(|(variant, _)| *variant)
    }
}

/// Uppercase and map `-` and spaces to `_`, so `low-quality` and
/// `LOW_QUALITY` compare equal.
pub fn normalize_enum_name(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn malformed(message: impl Into<String>) -> MollomError {
    MollomError::MalformedResponse(message.into())
}

fn mismatch(expected: &FieldKind, node: &WireNode) -> MollomError {
    malformed(format!("expected {}, got {}", expected, node.kind_name()))
}

/// Decode a node into `T`, treating "unset" at the top level as malformed.
pub fn decode<T: FromWire>(node: &WireNode) -> Result<T> {
    T::from_wire(node)?.ok_or_else(|| mismatch(&T::kind(), node))
}

/// Decode a map node into a [`WireObject`] using its descriptor
pub fn decode_object<T: WireObject>(node: &WireNode) -> Result<T> {
    let descriptor = T::descriptor();
    let map = match node {
        WireNode::Map(map) => map,
        other => {
            return Err(malformed(format!(
                "expected object {}, got {}",
                descriptor.name,
                other.kind_name()
            )))
        }
    };

    let mut target = T::default();
    for field in &descriptor.fields {
        let Some(value) = field.lookup(map) else {
            continue;
        };

        (field.apply)(&mut target, value).map_err(|e| match e {
            MollomError::MalformedResponse(msg) => {
                malformed(format!("{}.{}: {}", descriptor.name, field.names[0], msg))
            }
            other => other,
        })?;
    }

    Ok(target)
}

/// Decode a scalar node into an enum variant
pub fn decode_enum<E: WireEnum>(node: &WireNode) -> Result<Option<E>> {
    if !node.is_scalar() {
        return Err(mismatch(&FieldKind::Enum(E::NAME), node));
    }

    let Some(text) = node.scalar_text() else {
        return Ok(None);
    };
    let variant = E::from_wire_str(&text);
    if variant.is_none() {
        debug!("Unknown {} value '{}', leaving unset", E::NAME, text);
    }
    Ok(variant)
}

impl FromWire for String {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::String)
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        match node {
            WireNode::List(_) | WireNode::Map(_) => Err(mismatch(&Self::kind(), node)),
            scalar => Ok(scalar.scalar_text()),
        }
    }
}

impl FromWire for bool {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Bool)
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        match node {
            WireNode::Nil => Ok(None),
            WireNode::Bool(b) => Ok(Some(*b)),
            WireNode::Int(i) => Ok(Some(*i != 0)),
            WireNode::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(Some(true)),
                "0" | "false" => Ok(Some(false)),
                _ => Err(mismatch(&Self::kind(), node)),
            },
            other => Err(mismatch(&Self::kind(), other)),
        }
    }
}

impl FromWire for i64 {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Int)
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        match node {
            WireNode::Nil => Ok(None),
            WireNode::Int(i) => Ok(Some(*i)),
            WireNode::Double(d) if d.fract() == 0.0 => Ok(Some(*d as i64)),
            WireNode::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| mismatch(&Self::kind(), node)),
            other => Err(mismatch(&Self::kind(), other)),
        }
    }
}

impl FromWire for i32 {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Int)
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        match i64::from_wire(node)? {
            Some(value) => i32::try_from(value)
                .map(Some)
                .map_err(|_| malformed(format!("integer {} out of range", value))),
            None => Ok(None),
        }
    }
}

impl FromWire for f64 {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Double)
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        match node {
            WireNode::Nil => Ok(None),
            WireNode::Double(d) => Ok(Some(*d)),
            WireNode::Int(i) => Ok(Some(*i as f64)),
            WireNode::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| mismatch(&Self::kind(), node)),
            other => Err(mismatch(&Self::kind(), other)),
        }
    }
}

impl FromWire for WireNode {
    fn kind() -> FieldKind {
        FieldKind::Any
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        Ok(Some(node.clone()))
    }
}

impl<T: FromWire> FromWire for Option<T> {
    fn kind() -> FieldKind {
        FieldKind::Optional(Box::new(T::kind()))
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        match node {
            WireNode::Nil => Ok(None),
            other => Ok(T::from_wire(other)?.map(Some)),
        }
    }
}

impl<T: FromWire + Default> FromWire for Vec<T> {
    fn kind() -> FieldKind {
        FieldKind::Array(Box::new(T::kind()))
    }

    fn from_wire(node: &WireNode) -> Result<Option<Self>> {
        match node {
            WireNode::Nil => Ok(None),
            // an empty XML element carries no children at all
            WireNode::String(s) if s.trim().is_empty() => Ok(Some(Vec::new())),
            WireNode::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    T::from_wire(item)
                        .map(Option::unwrap_or_default)
                        .map_err(|e| match e {
                            MollomError::MalformedResponse(msg) => malformed(format!("[{}]: {}", i, msg)),
                            other => other,
                        })
                })
                .collect::<Result<Vec<T>>>()
                .map(Some),
            other => Err(mismatch(&Self::kind(), other)),
        }
    }
}

/// Declare a struct decoded from a wire map.
///
/// Each field lists the wire names it accepts, tried in order:
///
/// ```
/// mollom_rs::wire_object! {
///     pub struct Captcha {
///         pub session_id: String => ["session_id", "id"],
///         pub url: Option<String> => ["url"],
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_object {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty => [$($wire:literal),+ $(,)?]
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::mapper::WireObject for $name {
            fn descriptor() -> &'static $crate::mapper::TypeDescriptor<Self> {
                static DESCRIPTOR: ::std::sync::OnceLock<$crate::mapper::TypeDescriptor<$name>> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    $crate::mapper::TypeDescriptor::new(
                        stringify!($name),
                        vec![
                            $(
                                $crate::mapper::FieldDescriptor::new(
                                    &[$($wire),+],
                                    <$ty as $crate::mapper::FromWire>::kind(),
                                    |target: &mut $name,
                                     node: &$crate::wire::WireNode|
                                     -> $crate::error::Result<()> {
                                        if let Some(value) =
                                            <$ty as $crate::mapper::FromWire>::from_wire(node)?
                                        {
                                            target.$field = value;
                                        }
                                        Ok(())
                                    },
                                ),
                            )*
                        ],
                    )
                })
            }
        }

        impl $crate::mapper::FromWire for $name {
            fn kind() -> $crate::mapper::FieldKind {
                $crate::mapper::FieldKind::Object(stringify!($name))
            }

            fn from_wire(
                node: &$crate::wire::WireNode,
            ) -> $crate::error::Result<Option<Self>> {
                match node {
                    $crate::wire::WireNode::Nil => Ok(None),
                    other => $crate::mapper::decode_object::<Self>(other).map(Some),
                }
            }
        }
    };
}

/// Declare an enumeration with canonical wire names.
///
/// ```
/// mollom_rs::wire_enum! {
///     pub enum Verdict {
///         Ham => "ham",
///         LowQuality => "low-quality",
///     }
/// }
/// assert_eq!(Verdict::LowQuality.as_str(), "low-quality");
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )+
        }

        impl $name {
            /// Canonical wire name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $crate::mapper::WireEnum for $name {
            const NAME: &'static str = stringify!($name);
            const VARIANTS: &'static [(Self, &'static str)] = &[ $( ($name::$variant, $wire), )+ ];

            fn as_wire_str(&self) -> &'static str {
                self.as_str()
            }
        }

        impl $crate::mapper::FromWire for $name {
            fn kind() -> $crate::mapper::FieldKind {
                $crate::mapper::FieldKind::Enum(stringify!($name))
            }

            fn from_wire(
                node: &$crate::wire::WireNode,
            ) -> $crate::error::Result<Option<Self>> {
                $crate::mapper::decode_enum::<Self>(node)
            }
        }
    };
}
