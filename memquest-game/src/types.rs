//! Mapping from C type tokens to the gameplay characters that represent them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const TYPE_QUALIFIERS: [&str; 3] = ["const", "static", "volatile"];

static ARRAY_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((?:\w+\s+)*?\w+)\s+(\w+)\s*\[\s*(\d*)\s*\]").expect("array declaration pattern")
});
static POINTER_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((?:\w+\s+)*?\w+)\s*(\*+)\s*(\w+)").expect("pointer declaration pattern")
});
static SIMPLE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((?:\w+\s+)*?\w+)\s+(\w+)\s*(?:[=;,)]|$)").expect("simple declaration pattern")
});

/// Gameplay character class for a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CharacterTag {
    #[default]
    Int,
    Char,
    Short,
    Pointer,
    Array,
}

/// Static description of a character class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterInfo {
    pub tag: CharacterTag,
    pub unit: &'static str,
    pub byte_width: usize,
    pub description: &'static str,
}

const CHARACTERS: [CharacterInfo; 5] = [
    CharacterInfo {
        tag: CharacterTag::Int,
        unit: "catapult",
        byte_width: 4,
        description: "Holds a whole number",
    },
    CharacterInfo {
        tag: CharacterTag::Char,
        unit: "scout",
        byte_width: 1,
        description: "Holds a single character",
    },
    CharacterInfo {
        tag: CharacterTag::Short,
        unit: "squire",
        byte_width: 2,
        description: "Holds a small whole number",
    },
    CharacterInfo {
        tag: CharacterTag::Pointer,
        unit: "ballista",
        byte_width: 8,
        description: "Holds the address of another unit",
    },
    CharacterInfo {
        tag: CharacterTag::Array,
        unit: "barracks",
        byte_width: 0,
        description: "A row of units of the same type",
    },
];

impl CharacterTag {
    #[must_use]
    pub fn info(self) -> &'static CharacterInfo {
        CHARACTERS
            .iter()
            .find(|info| info.tag == self)
            .unwrap_or(&CHARACTERS[0])
    }

    /// Unit name used when spawning an entity for this character.
    #[must_use]
    pub fn unit(self) -> &'static str {
        self.info().unit
    }

    #[must_use]
    pub fn all() -> [CharacterTag; 5] {
        [
            CharacterTag::Int,
            CharacterTag::Char,
            CharacterTag::Short,
            CharacterTag::Pointer,
            CharacterTag::Array,
        ]
    }
}

impl fmt::Display for CharacterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterTag::Int => write!(f, "int"),
            CharacterTag::Char => write!(f, "char"),
            CharacterTag::Short => write!(f, "short"),
            CharacterTag::Pointer => write!(f, "pointer"),
            CharacterTag::Array => write!(f, "array"),
        }
    }
}

/// Classify a type string into a character.
///
/// Pointers win over arrays, arrays over scalars. Scalars are matched by prefix
/// after stripping qualifiers. Anything unrecognized (`float`, `long`, typos)
/// is treated as `int` so that levels with unusual types stay playable.
#[must_use]
pub fn get_character_for_type(type_str: &str) -> CharacterTag {
    if type_str.contains('*') {
        return CharacterTag::Pointer;
    }
    if type_str.contains('[') {
        return CharacterTag::Array;
    }
    let base = strip_qualifiers(type_str);
    if base.starts_with("int") {
        CharacterTag::Int
    } else if base.starts_with("char") {
        CharacterTag::Char
    } else if base.starts_with("short") {
        CharacterTag::Short
    } else {
        CharacterTag::Int
    }
}

/// Remove `const`/`static`/`volatile` words from a type string.
#[must_use]
pub fn strip_qualifiers(type_str: &str) -> String {
    type_str
        .split_whitespace()
        .filter(|word| !TYPE_QUALIFIERS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Surface form of a parsed declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeclarationKind {
    Simple,
    Pointer { depth: usize },
    Array { size: Option<usize> },
}

/// Result of [`parse_type_declaration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub base_type: String,
    pub name: String,
    pub kind: DeclarationKind,
}

impl TypeDeclaration {
    /// Type as written in level data, e.g. `int*`, `char[4]`, `int[]`.
    #[must_use]
    pub fn full_type(&self) -> String {
        match self.kind {
            DeclarationKind::Simple => self.base_type.clone(),
            DeclarationKind::Pointer { depth } => format!("{}{}", self.base_type, "*".repeat(depth)),
            DeclarationKind::Array { size: Some(size) } => format!("{}[{size}]", self.base_type),
            DeclarationKind::Array { size: None } => format!("{}[]", self.base_type),
        }
    }

    #[must_use]
    pub fn character(&self) -> CharacterTag {
        get_character_for_type(&self.full_type())
    }
}

/// Parse `type name[size]`, `type *name` or `type name`, in that order.
#[must_use]
pub fn parse_type_declaration(input: &str) -> Option<TypeDeclaration> {
    if let Some(caps) = ARRAY_DECL.captures(input) {
        return Some(TypeDeclaration {
            base_type: caps[1].trim().to_string(),
            name: caps[2].to_string(),
            kind: DeclarationKind::Array {
                size: caps[3].parse().ok(),
            },
        });
    }
    if let Some(caps) = POINTER_DECL.captures(input) {
        return Some(TypeDeclaration {
            base_type: caps[1].trim().to_string(),
            name: caps[3].to_string(),
            kind: DeclarationKind::Pointer {
                depth: caps[2].len(),
            },
        });
    }
    SIMPLE_DECL.captures(input).map(|caps| TypeDeclaration {
        base_type: caps[1].trim().to_string(),
        name: caps[2].to_string(),
        kind: DeclarationKind::Simple,
    })
}
