use std::{
    cell::RefCell,
    collections::HashMap,
    ffi::{CString, c_char},
};

/// URI to integer interning for one run.
///
/// Identifiers start at 1; 0 is never handed out. Owned by a single thread,
/// plugin callbacks reach it through a raw handle.
#[derive(Debug, Default)]
pub struct UridMap {
    table: RefCell<UridTable>,
}

#[derive(Debug, Default)]
struct UridTable {
    by_uri: HashMap<String, u32>,
    by_urid: Vec<CString>,
}

impl UridMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns 0 for URIs that cannot cross the C boundary.
    pub fn map(&self, uri: &str) -> u32 {
        let mut table = self.table.borrow_mut();
        if let Some(existing) = table.by_uri.get(uri).copied() {
            return existing;
        }
        let Ok(c_uri) = CString::new(uri) else {
            return 0;
        };
        table.by_urid.push(c_uri);
        let Ok(urid) = u32::try_from(table.by_urid.len()) else {
            table.by_urid.pop();
            return 0;
        };
        table.by_uri.insert(uri.to_string(), urid);
        urid
    }

    pub fn unmap(&self, urid: u32) -> Option<String> {
        let table = self.table.borrow();
        let index = usize::try_from(urid).ok()?.checked_sub(1)?;
        table
            .by_urid
            .get(index)
            .and_then(|uri| uri.to_str().ok().map(str::to_string))
    }

    /// Pointer stays valid for the life of the map: entries are never removed
    /// and each `CString` owns its own allocation.
    pub(crate) fn unmap_ptr(&self, urid: u32) -> *const c_char {
        let table = self.table.borrow();
        usize::try_from(urid)
            .ok()
            .and_then(|urid| urid.checked_sub(1))
            .and_then(|index| table.by_urid.get(index))
            .map(|uri| uri.as_ptr())
            .unwrap_or(std::ptr::null())
    }

    pub fn len(&self) -> usize {
        self.table.borrow().by_urid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
