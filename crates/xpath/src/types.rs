//! Sequence types: an item type plus a cardinality.
//!
//! Static type inference reports a [`SequenceType`] for every expression and
//! the stylesheet compiler checks it against the type an attribute requires.

use crate::error::XPathError;
use crate::value::AtomicValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Item,
    AnyAtomic,
    String,
    UntypedAtomic,
    Boolean,
    Numeric,
    Integer,
    Double,
}

impl ItemType {
    /// True if every value of `other` is also a value of `self`.
    pub fn subsumes(self, other: ItemType) -> bool {
        use ItemType::*;
        match (self, other) {
            (a, b) if a == b => true,
            (Item, _) => true,
            (AnyAtomic, Item) => false,
            (AnyAtomic, _) => true,
            (Numeric, Integer | Double) => true,
            _ => false,
        }
    }

    /// True if some value could belong to both types.
    pub fn overlaps(self, other: ItemType) -> bool {
        self.subsumes(other) || other.subsumes(self)
    }

    pub fn is_atomic(self) -> bool {
        self != ItemType::Item
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ItemType::Numeric | ItemType::Integer | ItemType::Double)
    }

    pub fn common_supertype(self, other: ItemType) -> ItemType {
        if self.subsumes(other) {
            self
        } else if other.subsumes(self) {
            other
        } else if self.is_numeric() && other.is_numeric() {
            ItemType::Numeric
        } else if self.is_atomic() && other.is_atomic() {
            ItemType::AnyAtomic
        } else {
            ItemType::Item
        }
    }

    pub fn matches(self, value: &AtomicValue) -> bool {
        self.subsumes(value.item_type())
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemType::Item => "item()",
            ItemType::AnyAtomic => "xs:anyAtomicType",
            ItemType::String => "xs:string",
            ItemType::UntypedAtomic => "xs:untypedAtomic",
            ItemType::Boolean => "xs:boolean",
            ItemType::Numeric => "xs:numeric",
            ItemType::Integer => "xs:integer",
            ItemType::Double => "xs:double",
        }
    }

    pub fn from_name(name: &str) -> Option<ItemType> {
        let item_type = match name.trim() {
            "item()" => ItemType::Item,
            "xs:anyAtomicType" => ItemType::AnyAtomic,
            "xs:string" => ItemType::String,
            "xs:untypedAtomic" => ItemType::UntypedAtomic,
            "xs:boolean" => ItemType::Boolean,
            "xs:numeric" => ItemType::Numeric,
            "xs:integer" => ItemType::Integer,
            "xs:double" => ItemType::Double,
            _ => return None,
        };
        Some(item_type)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many items a sequence may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Empty,
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    pub fn allows_empty(self) -> bool {
        matches!(
            self,
            Cardinality::Empty | Cardinality::ZeroOrOne | Cardinality::ZeroOrMore
        )
    }

    pub fn allows_one(self) -> bool {
        self != Cardinality::Empty
    }

    pub fn allows_many(self) -> bool {
        matches!(self, Cardinality::ZeroOrMore | Cardinality::OneOrMore)
    }

    pub fn subsumes(self, other: Cardinality) -> bool {
        (!other.allows_empty() || self.allows_empty())
            && (!other.allows_one() || self.allows_one())
            && (!other.allows_many() || self.allows_many())
    }

    pub fn intersects(self, other: Cardinality) -> bool {
        (self.allows_empty() && other.allows_empty())
            || (self.allows_one() && other.allows_one())
            || (self.allows_many() && other.allows_many())
    }

    pub fn matches(self, count: usize) -> bool {
        match count {
            0 => self.allows_empty(),
            1 => self.allows_one(),
            _ => self.allows_many(),
        }
    }

    fn bounds(self) -> (u8, u8) {
        match self {
            Cardinality::Empty => (0, 0),
            Cardinality::ExactlyOne => (1, 1),
            Cardinality::ZeroOrOne => (0, 1),
            Cardinality::ZeroOrMore => (0, 2),
            Cardinality::OneOrMore => (1, 2),
        }
    }

    fn from_bounds(min: u8, max: u8) -> Self {
        match (min.min(1), max.min(2)) {
            (_, 0) => Cardinality::Empty,
            (1, 1) => Cardinality::ExactlyOne,
            (0, 1) => Cardinality::ZeroOrOne,
            (0, _) => Cardinality::ZeroOrMore,
            _ => Cardinality::OneOrMore,
        }
    }

    /// Cardinality of two sequences concatenated.
    pub fn sum(self, other: Cardinality) -> Cardinality {
        let (a_min, a_max) = self.bounds();
        let (b_min, b_max) = other.bounds();
        Self::from_bounds(a_min + b_min, a_max + b_max)
    }

    /// Cardinality of a value that is one of two alternatives.
    pub fn union(self, other: Cardinality) -> Cardinality {
        let (a_min, a_max) = self.bounds();
        let (b_min, b_max) = other.bounds();
        Self::from_bounds(a_min.min(b_min), a_max.max(b_max))
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Cardinality::Empty | Cardinality::ExactlyOne => "",
            Cardinality::ZeroOrOne => "?",
            Cardinality::ZeroOrMore => "*",
            Cardinality::OneOrMore => "+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceType {
    pub item_type: ItemType,
    pub cardinality: Cardinality,
}

impl SequenceType {
    pub const fn new(item_type: ItemType, cardinality: Cardinality) -> Self {
        Self {
            item_type,
            cardinality,
        }
    }

    pub const fn single(item_type: ItemType) -> Self {
        Self::new(item_type, Cardinality::ExactlyOne)
    }

    pub const fn optional(item_type: ItemType) -> Self {
        Self::new(item_type, Cardinality::ZeroOrOne)
    }

    pub const fn any(item_type: ItemType) -> Self {
        Self::new(item_type, Cardinality::ZeroOrMore)
    }

    pub const fn empty() -> Self {
        Self::new(ItemType::Item, Cardinality::Empty)
    }

    pub const SINGLE_INTEGER: SequenceType = SequenceType::single(ItemType::Integer);
    pub const OPTIONAL_STRING: SequenceType = SequenceType::optional(ItemType::String);
    pub const ATOMIC_SEQUENCE: SequenceType = SequenceType::any(ItemType::AnyAtomic);
    pub const ITEM_SEQUENCE: SequenceType = SequenceType::any(ItemType::Item);

    pub fn is_empty_sequence(&self) -> bool {
        self.cardinality == Cardinality::Empty
    }

    /// True if every value of `other` is also a value of `self`.
    pub fn subsumes(&self, other: &SequenceType) -> bool {
        if other.is_empty_sequence() {
            return self.cardinality.allows_empty();
        }
        self.cardinality.subsumes(other.cardinality) && self.item_type.subsumes(other.item_type)
    }

    /// The type of a value that is either `self` or `other`.
    pub fn union(&self, other: &SequenceType) -> SequenceType {
        let item_type = match (self.is_empty_sequence(), other.is_empty_sequence()) {
            (true, _) => other.item_type,
            (_, true) => self.item_type,
            _ => self.item_type.common_supertype(other.item_type),
        };
        SequenceType::new(item_type, self.cardinality.union(other.cardinality))
    }

    /// The type of `self` followed by `other`.
    pub fn concat(&self, other: &SequenceType) -> SequenceType {
        let item_type = match (self.is_empty_sequence(), other.is_empty_sequence()) {
            (true, _) => other.item_type,
            (_, true) => self.item_type,
            _ => self.item_type.common_supertype(other.item_type),
        };
        SequenceType::new(item_type, self.cardinality.sum(other.cardinality))
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty_sequence() {
            return f.write_str("empty-sequence()");
        }
        write!(f, "{}{}", self.item_type, self.cardinality.indicator())
    }
}

/// Parses the `as` attribute syntax, e.g. `xs:integer`, `xs:string?`, `item()*`.
pub fn parse_sequence_type(s: &str) -> Result<SequenceType, XPathError> {
    let s = s.trim();
    if s == "empty-sequence()" {
        return Ok(SequenceType::empty());
    }

    let (item, cardinality) = if let Some(stripped) = s.strip_suffix('?') {
        (stripped, Cardinality::ZeroOrOne)
    } else if let Some(stripped) = s.strip_suffix('*') {
        (stripped, Cardinality::ZeroOrMore)
    } else if let Some(stripped) = s.strip_suffix('+') {
        (stripped, Cardinality::OneOrMore)
    } else {
        (s, Cardinality::ExactlyOne)
    };

    let item_type = ItemType::from_name(item)
        .ok_or_else(|| XPathError::parse(s, format!("Unknown item type '{}'", item)))?;
    Ok(SequenceType::new(item_type, cardinality))
}
