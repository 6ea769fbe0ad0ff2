/*
 * Shared ownership of a raw heap pointer, counted but not thread-safe.
 * It's like Rc without the weak half: the object and its use count live in
 * two separate heap cells, and every clone shares both by address.
 * The last owner out frees the object AND the count cell.
 *
 * The count is a plain Cell<usize>, not an atomic: raw-pointer fields make
 * the type !Send + !Sync, so "don't touch a family from two threads" is a
 * compile error here rather than a race.
 */

use std::cell::Cell;
use std::fmt;
use std::mem;
use std::ptr;

pub struct SharedPtr<T> {
    ptr: *mut T,
    // null iff ptr is null - an empty owner has no count at all
    count: *mut Cell<usize>,
}

impl<T> SharedPtr<T> {
    /// An empty owner: no object, no count cell.
    pub fn null() -> Self {
        Self {
            ptr: ptr::null_mut(),
            count: ptr::null_mut(),
        }
    }

    /// Allocate `value` on the heap and start a fresh family of one.
    pub fn new(value: T) -> Self {
        // SAFETY: a fresh Box address is owned by no one else
        unsafe { Self::from_raw(Box::into_raw(Box::new(value))) }
    }

    /// Adopt a caller-supplied address into a fresh family (count = 1).
    /// Null is fine and yields an empty owner with no count cell.
    ///
    /// # Safety
    /// `ptr` must have come from `Box::into_raw` and must not be owned or
    /// freed through anything outside this family afterwards.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            ptr,
            count: if ptr.is_null() {
                ptr::null_mut()
            } else {
                Box::into_raw(Box::new(Cell::new(1)))
            },
        }
    }

    fn count(&self) -> Option<&Cell<usize>> {
        // SAFETY: a non-null count cell stays allocated while any family
        // member is alive, and we are one
        unsafe { self.count.as_ref() }
    }

    /*
     * The one algorithm that matters: decrement, and let exactly the owner
     * that sees the zero transition free both cells. Sequential decrement-
     * then-compare is enough, there's no other thread to race with.
     * Own fields are cleared BEFORE the frees, so a pointee Drop that
     * reenters this owner finds it already empty.
     */
    fn cleanup(&mut self) {
        if self.count.is_null() {
            return;
        }
        let ptr = mem::replace(&mut self.ptr, ptr::null_mut());
        let count = mem::replace(&mut self.count, ptr::null_mut());
        // SAFETY: both cells are alive, see count()
        let cell = unsafe { &*count };
        cell.set(cell.get() - 1);
        if cell.get() == 0 {
            // last one out frees the object and the counter itself
            // SAFETY: count hit zero => no other owner holds these addresses
            unsafe {
                drop(Box::from_raw(ptr));
                drop(Box::from_raw(count));
            }
        }
    }

    pub fn get(&self) -> *mut T {
        self.ptr
    }

    /// How many owners the family has; 0 for an empty owner. No side effects.
    pub fn use_count(&self) -> usize {
        self.count().map_or(0, Cell::get)
    }

    /// The boolean conversion: an owner is "false" when empty.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Leave the family (freeing the object if we were the last) and
    /// become empty. A no-op on an empty owner.
    pub fn reset(&mut self) {
        self.cleanup();
    }

    /// Leave the family, then adopt `new_ptr` into a fresh one.
    ///
    /// # Safety
    /// Same contract as [`from_raw`](Self::from_raw) for `new_ptr`.
    pub unsafe fn reset_with(&mut self, new_ptr: *mut T) {
        self.cleanup();
        *self = Self::from_raw(new_ptr);
    }

    /// Move both the address and the count reference out, leaving `self`
    /// empty. The count is NOT touched - ownership transferred, not shared.
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::null())
    }

    /// Checked view of the pointee.
    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: a non-null ptr is kept alive by our own count
        unsafe { self.ptr.as_ref() }
    }

    /// Unchecked dereference, no null test.
    ///
    /// # Safety
    /// The owner must be non-empty.
    pub unsafe fn deref(&self) -> &T {
        &*self.ptr
    }

    /// Unchecked mutable dereference, no null test.
    ///
    /// # Safety
    /// The owner must be non-empty, and the caller must guarantee no other
    /// family member is reading or writing the pointee meanwhile.
    pub unsafe fn deref_mut(&mut self) -> &mut T {
        &mut *self.ptr
    }

    /// Constant-time exchange of both the address and the count reference.
    /// Neither family's count changes - each owner just switches families.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
        mem::swap(&mut self.count, &mut other.count);
    }
}

/// Joining the family: same cells, count + 1.
impl<T> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        if let Some(cell) = self.count() {
            cell.set(cell.get() + 1);
        }
        Self {
            ptr: self.ptr,
            count: self.count,
        }
    }
}

impl<T> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<T> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// Owners are equal iff they point at the same object; two empties are equal.
impl<T> PartialEq for SharedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for SharedPtr<T> {}

impl<T> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPtr")
            .field("ptr", &self.ptr)
            .field("use_count", &self.use_count())
            .finish()
    }
}

pub fn run() {
    let a = SharedPtr::new(String::from("jointly owned"));
    println!("a: {:?}", a);

    let b = a.clone();
    println!("after clone: a count = {}, b count = {}", a.use_count(), b.use_count());

    drop(a);
    println!("after dropping a: b = {:?}, pointee = {:?}", b, b.as_ref());
    // b is the last owner, the string and the counter die here
}
