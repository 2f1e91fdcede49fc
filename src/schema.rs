//! Schema descriptors for bindable types.
//!
//! [`Bindable`] is normally derived with `#[derive(Bindable)]`; the derive
//! lists every named field not marked `#[skip]` as a member, in declaration
//! order. [`TypeDescriptor::for_type`] builds the descriptor once per type
//! and keeps it for the life of the process.

use crate::binding::{BindingError, NameMatching};
use crate::value::{Value, ValueKind};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A type whose instances can be populated from result rows.
///
/// Members are addressed by their position in [`Bindable::members`].
pub trait Bindable: Default + 'static {
    /// Type name used in error messages.
    fn type_name() -> &'static str;

    /// Writable members, in a fixed order.
    fn members() -> Vec<MemberDescriptor>;

    /// Store an already converted value into member `member`.
    ///
    /// # Errors
    ///
    /// Hands the value back when the member cannot hold it.
    fn assign(&mut self, member: usize, value: Value) -> Result<(), Value>;

    /// Current member values, in [`Bindable::members`] order.
    fn member_values(&self) -> Vec<Value>;
}

/// Expected name, kind and nullability of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    name: &'static str,
    kind: ValueKind,
    nullable: bool,
}

impl MemberDescriptor {
    pub const fn new(name: &'static str, kind: ValueKind, nullable: bool) -> Self {
        Self {
            name,
            kind,
            nullable,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Ordered member list of a bindable type with name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    members: Vec<MemberDescriptor>,
    by_folded_name: HashMap<String, usize>,
}

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

impl TypeDescriptor {
    /// Build a fresh descriptor for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NoBindableMembers`] if `T` has no members.
    pub fn build<T: Bindable>() -> Result<Self, BindingError> {
        let members = T::members();
        if members.is_empty() {
            return Err(BindingError::NoBindableMembers {
                type_name: T::type_name().to_string(),
            });
        }
        let mut by_folded_name = HashMap::with_capacity(members.len());
        for (index, member) in members.iter().enumerate() {
            // First declaration wins when two names fold together.
            by_folded_name
                .entry(member.name.to_lowercase())
                .or_insert(index);
        }
        Ok(Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            members,
            by_folded_name,
        })
    }

    /// Cached descriptor for `T`, built on first use.
    ///
    /// Concurrent first uses may each build a descriptor; the first one
    /// stored is kept and returned to everyone.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NoBindableMembers`] if `T` has no members.
    pub fn for_type<T: Bindable>() -> Result<Arc<Self>, BindingError> {
        let key = TypeId::of::<T>();
        if let Some(found) = DESCRIPTORS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(found));
        }

        log::debug!("building type descriptor for {}", T::type_name());
        let built = Arc::new(Self::build::<T>()?);
        let mut cache = DESCRIPTORS.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(built)))
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn member(&self, index: usize) -> Option<&MemberDescriptor> {
        self.members.get(index)
    }

    /// Position of the member matching `column` under `matching`.
    pub fn member_index(&self, column: &str, matching: NameMatching) -> Option<usize> {
        match matching {
            NameMatching::CaseInsensitive => {
                self.by_folded_name.get(&column.to_lowercase()).copied()
            }
            NameMatching::CaseSensitive => self.members.iter().position(|m| m.name == column),
        }
    }
}
