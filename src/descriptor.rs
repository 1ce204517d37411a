//! Decoded class-file descriptors handed to the model builder.
//!
//! Decoding the binary class-file format is the job of an upstream
//! collaborator; the builder only ever sees these already-materialized
//! structures. They deserialize from JSON so descriptor sets can be produced
//! by any external decoder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const JAVA_LANG_OBJECT: &str = "java.lang.Object";

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// JVM access flag mask for a class, field or method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub fn is_public(self) -> bool {
        self.0 & ACC_PUBLIC != 0
    }

    pub fn is_private(self) -> bool {
        self.0 & ACC_PRIVATE != 0
    }

    pub fn is_protected(self) -> bool {
        self.0 & ACC_PROTECTED != 0
    }

    pub fn is_static(self) -> bool {
        self.0 & ACC_STATIC != 0
    }

    pub fn is_final(self) -> bool {
        self.0 & ACC_FINAL != 0
    }

    pub fn is_interface(self) -> bool {
        self.0 & ACC_INTERFACE != 0
    }

    pub fn is_abstract(self) -> bool {
        self.0 & ACC_ABSTRACT != 0
    }
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid type signature: {0}")]
    InvalidType(String),
    #[error("invalid method signature: {0}")]
    InvalidMethod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    fn from_tag(c: char) -> Option<Self> {
        Some(match c {
            'Z' => Self::Boolean,
            'B' => Self::Byte,
            'C' => Self::Char,
            'S' => Self::Short,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            _ => return None,
        })
    }

    fn tag(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    pub fn source_name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

/// A field, parameter or return type as declared in a class file.
///
/// Parses from the JVM signature grammar (`I`, `Ljava/lang/String;`, `[[D`)
/// and displays as the Java source spelling (`int`, `java.lang.String`,
/// `double[][]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JavaType {
    Primitive(PrimitiveKind),
    /// Dotted qualified class name, `$`-delimited for nested classes.
    Object(String),
    Array { elem: Box<JavaType>, dims: u8 },
}

impl JavaType {
    pub fn object(name: &str) -> Self {
        Self::Object(name.to_string())
    }

    pub fn signature(&self) -> String {
        match self {
            Self::Primitive(p) => p.tag().to_string(),
            Self::Object(name) => format!("L{};", name.replace('.', "/")),
            Self::Array { elem, dims } => {
                format!("{}{}", "[".repeat(*dims as usize), elem.signature())
            }
        }
    }

    fn parse_prefix(s: &str) -> Result<(JavaType, &str), SignatureError> {
        let mut dims = 0u8;
        let mut rest = s;
        while let Some(r) = rest.strip_prefix('[') {
            dims = dims
                .checked_add(1)
                .ok_or_else(|| SignatureError::InvalidType(s.to_string()))?;
            rest = r;
        }
        let (base, rest) = match rest.chars().next() {
            Some('L') => {
                let end = rest
                    .find(';')
                    .ok_or_else(|| SignatureError::InvalidType(s.to_string()))?;
                let name = rest[1..end].replace('/', ".");
                if name.is_empty() {
                    return Err(SignatureError::InvalidType(s.to_string()));
                }
                (JavaType::Object(name), &rest[end + 1..])
            }
            Some(c) => match PrimitiveKind::from_tag(c) {
                Some(p) => (JavaType::Primitive(p), &rest[1..]),
                None => return Err(SignatureError::InvalidType(s.to_string())),
            },
            None => return Err(SignatureError::InvalidType(s.to_string())),
        };
        if dims > 0 {
            Ok((
                JavaType::Array {
                    elem: Box::new(base),
                    dims,
                },
                rest,
            ))
        } else {
            Ok((base, rest))
        }
    }
}

impl FromStr for JavaType {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ty, rest) = Self::parse_prefix(s)?;
        if !rest.is_empty() {
            return Err(SignatureError::InvalidType(s.to_string()));
        }
        Ok(ty)
    }
}

impl TryFrom<String> for JavaType {
    type Error = SignatureError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<JavaType> for String {
    fn from(ty: JavaType) -> String {
        ty.signature()
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.source_name()),
            Self::Object(name) => f.write_str(name),
            Self::Array { elem, dims } => {
                write!(f, "{elem}{}", "[]".repeat(*dims as usize))
            }
        }
    }
}

/// Parsed `(params)return` method descriptor. Return is `None` for `void`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodSignature {
    pub params: Vec<JavaType>,
    pub ret: Option<JavaType>,
}

impl MethodSignature {
    pub fn signature(&self) -> String {
        let params: String = self.params.iter().map(JavaType::signature).collect();
        let ret = match &self.ret {
            Some(ty) => ty.signature(),
            None => "V".to_string(),
        };
        format!("({params}){ret}")
    }
}

impl FromStr for MethodSignature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('(')
            .ok_or_else(|| SignatureError::InvalidMethod(s.to_string()))?;
        let close = inner
            .find(')')
            .ok_or_else(|| SignatureError::InvalidMethod(s.to_string()))?;
        let mut rest = &inner[..close];
        let mut params = Vec::new();
        while !rest.is_empty() {
            let (ty, r) = JavaType::parse_prefix(rest)
                .map_err(|_| SignatureError::InvalidMethod(s.to_string()))?;
            params.push(ty);
            rest = r;
        }
        let ret_str = &inner[close + 1..];
        let ret = if ret_str == "V" {
            None
        } else {
            Some(
                ret_str
                    .parse()
                    .map_err(|_| SignatureError::InvalidMethod(s.to_string()))?,
            )
        };
        Ok(Self { params, ret })
    }
}

impl TryFrom<String> for MethodSignature {
    type Error = SignatureError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MethodSignature> for String {
    fn from(sig: MethodSignature) -> String {
        sig.signature()
    }
}

/// A single operand reference decoded from a bytecode instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperandRef {
    /// `new`, `checkcast`, `instanceof`, array allocation, ...
    Type { name: String },
    /// `getfield`, `putstatic`, ...
    Field {
        class: String,
        name: String,
        field_type: JavaType,
    },
    /// `invokevirtual`, `invokestatic`, `invokeinterface`, ...
    Method {
        class: String,
        name: String,
        signature: MethodSignature,
    },
}

/// Decoded body of one method: the operand references of its instructions
/// plus whether the code carries a pre-verification (StackMap) attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodCode {
    #[serde(default)]
    pub operands: Vec<OperandRef>,
    #[serde(default)]
    pub stack_map: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: JavaType,
    #[serde(default)]
    pub flags: AccessFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub signature: MethodSignature,
    #[serde(default)]
    pub flags: AccessFlags,
    #[serde(default)]
    pub code: Option<MethodCode>,
}

/// One decoded class file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Dotted qualified name, `$`-delimited for nested classes.
    pub name: String,
    /// Absent only for `java.lang.Object`.
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub flags: AccessFlags,
    #[serde(default)]
    pub major_version: u16,
    #[serde(default)]
    pub minor_version: u16,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn is_interface(&self) -> bool {
        self.flags.is_interface()
    }

    /// Superclass name, defaulting to `java.lang.Object` for every class
    /// except `java.lang.Object` itself.
    pub fn superclass_name(&self) -> Option<&str> {
        if self.name == JAVA_LANG_OBJECT {
            return None;
        }
        Some(self.superclass.as_deref().unwrap_or(JAVA_LANG_OBJECT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitive_and_object_signatures() {
        assert_eq!(
            "I".parse::<JavaType>().unwrap(),
            JavaType::Primitive(PrimitiveKind::Int)
        );
        assert_eq!(
            "Ljava/lang/String;".parse::<JavaType>().unwrap(),
            JavaType::object("java.lang.String")
        );
        assert_eq!("[[D".parse::<JavaType>().unwrap().to_string(), "double[][]");
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!("".parse::<JavaType>().is_err());
        assert!("Ljava/lang/String".parse::<JavaType>().is_err());
        assert!("X".parse::<JavaType>().is_err());
        assert!("II".parse::<JavaType>().is_err());
    }

    #[test]
    fn parses_method_signatures() {
        let sig: MethodSignature = "(ILjava/lang/String;[J)V".parse().unwrap();
        assert_eq!(sig.params.len(), 3);
        assert_eq!(sig.params[1], JavaType::object("java.lang.String"));
        assert!(sig.ret.is_none());
        assert_eq!(sig.signature(), "(ILjava/lang/String;[J)V");

        let sig: MethodSignature = "()La/B$C;".parse().unwrap();
        assert!(sig.params.is_empty());
        assert_eq!(sig.ret, Some(JavaType::object("a.B$C")));
    }

    #[test]
    fn access_flag_accessors() {
        let flags = AccessFlags(ACC_PUBLIC | ACC_ABSTRACT | ACC_INTERFACE);
        assert!(flags.is_public());
        assert!(flags.is_abstract());
        assert!(flags.is_interface());
        assert!(!flags.is_final());
    }

    #[test]
    fn superclass_defaults_to_object() {
        let desc = ClassDescriptor {
            name: "a.A".to_string(),
            superclass: None,
            interfaces: vec![],
            flags: AccessFlags(ACC_PUBLIC),
            major_version: 52,
            minor_version: 0,
            fields: vec![],
            methods: vec![],
        };
        assert_eq!(desc.superclass_name(), Some(JAVA_LANG_OBJECT));

        let object = ClassDescriptor {
            name: JAVA_LANG_OBJECT.to_string(),
            ..desc
        };
        assert_eq!(object.superclass_name(), None);
    }

    #[test]
    fn descriptor_deserializes_from_json() {
        let json = r#"{
            "name": "a.A",
            "superclass": "java.lang.Object",
            "interfaces": ["java.io.Serializable"],
            "flags": 33,
            "major_version": 52,
            "fields": [{"name": "count", "field_type": "I", "flags": 2}],
            "methods": [{
                "name": "f",
                "signature": "(I)V",
                "flags": 1,
                "code": {"operands": [{"kind": "type", "name": "a.B"}]}
            }]
        }"#;
        let desc: ClassDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.name, "a.A");
        assert!(desc.flags.is_public());
        assert_eq!(desc.fields[0].field_type, JavaType::Primitive(PrimitiveKind::Int));
        let code = desc.methods[0].code.as_ref().unwrap();
        assert_eq!(
            code.operands[0],
            OperandRef::Type {
                name: "a.B".to_string()
            }
        );
    }
}
