use lazy_static::lazy_static;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use string_cache::DefaultAtom as Atom;

lazy_static! {
    static ref TEXT_INTERNER: RwLock<Vec<Atom>> = RwLock::new(Vec::new());
}

// A panic while holding the lock cannot leave the Vec half-written, so a
// poisoned guard is still consistent.
fn read_table() -> RwLockReadGuard<'static, Vec<Atom>> {
    TEXT_INTERNER.read().unwrap_or_else(|e| e.into_inner())
}

fn write_table() -> RwLockWriteGuard<'static, Vec<Atom>> {
    TEXT_INTERNER.write().unwrap_or_else(|e| e.into_inner())
}

/// Intern a name and return its id. The same name always maps to the same id.
pub fn intern_text(s: &str) -> usize {
    let atom = Atom::from(s);
    if let Some(idx) = read_table().iter().position(|a| *a == atom) {
        return idx;
    }
    let mut v = write_table();
    match v.iter().position(|a| *a == atom) {
        Some(idx) => idx,
        None => {
            v.push(atom);
            v.len() - 1
        }
    }
}

/// Current count of unique names
pub fn interned_count() -> usize {
    read_table().len()
}

pub fn lookup_text(id: usize) -> Option<String> {
    read_table().get(id).map(|a| a.to_string())
}
