/*
 * Exclusive ownership of a raw heap pointer.
 * It's like Box, except:
 * - it can be empty (null), like after handing the pointer away
 * - the release action is pluggable, so it can own more than plain allocations
 * Ownership moves but never copies - there's no Clone here on purpose.
 */

use std::fmt;
use std::mem;
use std::ptr;

/// The release action: called exactly once per owned non-null address,
/// when ownership of that address ends.
///
/// An implementation may assume the pointer was bound into the
/// [`UniquePtr`] that is calling it and is not owned elsewhere.
pub trait Deleter<T> {
    fn delete(&mut self, ptr: *mut T);
}

/// Adapter turning any `FnMut(*mut T)` into a [`Deleter`], so closures
/// can serve as release actions.
pub struct FnDeleter<F>(pub F);

impl<T, F: FnMut(*mut T)> Deleter<T> for FnDeleter<F> {
    fn delete(&mut self, ptr: *mut T) {
        (self.0)(ptr)
    }
}

/// Reclaims through the global allocator, assuming the address came from Box.
#[derive(Default, Clone, Copy)]
pub struct DefaultDeleter;

impl<T> Deleter<T> for DefaultDeleter {
    fn delete(&mut self, ptr: *mut T) {
        // SAFETY: the owning UniquePtr only feeds us an address it got from
        // Box::into_raw (the from_raw contract), and it does so exactly once
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/*
 * No NonNull here, unlike the Arc chapter of the book: the empty state is
 * part of the contract, so the field is an honest nullable *mut.
 * A raw field also makes the type !Send + !Sync for free, which is the
 * whole concurrency story of this crate - there is none.
 */
pub struct UniquePtr<T, D: Deleter<T> = DefaultDeleter> {
    ptr: *mut T,
    deleter: D,
}

impl<T> UniquePtr<T> {
    /// Allocate `value` on the heap and own the result.
    pub fn new(value: T) -> Self {
        Self {
            ptr: Box::into_raw(Box::new(value)),
            deleter: DefaultDeleter,
        }
    }
}

impl<T, D: Deleter<T> + Default> UniquePtr<T, D> {
    /// An empty owner: no address, nothing to release.
    pub fn null() -> Self {
        Self {
            ptr: ptr::null_mut(),
            deleter: D::default(),
        }
    }

    /// Take ownership of a caller-supplied address. Null is fine and means empty.
    ///
    /// # Safety
    /// `ptr` must not be owned or used through anything else afterwards, and
    /// must have been allocated compatibly with `D` (for [`DefaultDeleter`]:
    /// it came from `Box::into_raw`).
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            ptr,
            deleter: D::default(),
        }
    }
}

impl<T, D: Deleter<T>> UniquePtr<T, D> {
    /// Same as [`from_raw`](Self::from_raw), with a custom release action.
    ///
    /// # Safety
    /// As for `from_raw`, except the allocation only has to be something
    /// `deleter` knows how to reclaim.
    pub unsafe fn with_deleter(ptr: *mut T, deleter: D) -> Self {
        Self { ptr, deleter }
    }

    pub fn get(&self) -> *mut T {
        self.ptr
    }

    /// The boolean conversion: an owner is "false" when empty.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Hand the address back to the caller without releasing it.
    /// The owner is empty afterwards; the caller now owns the address.
    pub fn release(&mut self) -> *mut T {
        mem::replace(&mut self.ptr, ptr::null_mut())
    }

    /// Release the held address (if any) and become empty.
    /// A no-op on an empty owner.
    pub fn reset(&mut self) {
        // clear first, then release: a deleter that reenters this owner
        // must find it already empty, or it could free the address twice
        let old = self.release();
        if !old.is_null() {
            self.deleter.delete(old);
        }
    }

    /// Release the held address (if any), then adopt `new_ptr`.
    ///
    /// # Safety
    /// Same contract as [`from_raw`](Self::from_raw) for `new_ptr`.
    pub unsafe fn reset_with(&mut self, new_ptr: *mut T) {
        // adopt before releasing, so even a deleter that conjures up the
        // same address again can't make us double-own it
        let old = mem::replace(&mut self.ptr, new_ptr);
        if !old.is_null() {
            self.deleter.delete(old);
        }
    }

    /// Move the owned address out, leaving `self` empty.
    /// This is the observable flavour of a move; a plain Rust move of the
    /// whole `UniquePtr` works too and kills the source at compile time.
    pub fn take(&mut self) -> Self
    where
        D: Default,
    {
        mem::replace(self, Self::null())
    }

    /// Checked view of the pointee.
    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: a non-null ptr is owned by us and valid (from_raw contract)
        unsafe { self.ptr.as_ref() }
    }

    /// Checked mutable view. Sound because ownership is exclusive.
    pub fn as_mut(&mut self) -> Option<&mut T> {
        // SAFETY: as above, plus &mut self rules out other borrows
        unsafe { self.ptr.as_mut() }
    }

    /// Unchecked dereference, no null test.
    ///
    /// # Safety
    /// The owner must be non-empty. Calling this on an empty owner is UB.
    pub unsafe fn deref(&self) -> &T {
        &*self.ptr
    }

    /// Unchecked mutable dereference, no null test.
    ///
    /// # Safety
    /// The owner must be non-empty.
    pub unsafe fn deref_mut(&mut self) -> &mut T {
        &mut *self.ptr
    }

    /// Constant-time exchange of both the address and the release action.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
        mem::swap(&mut self.deleter, &mut other.deleter);
    }
}

impl<T, D: Deleter<T> + Default> Default for UniquePtr<T, D> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T, D: Deleter<T>> Drop for UniquePtr<T, D> {
    fn drop(&mut self) {
        // same clear-then-release dance as reset()
        let old = self.release();
        if !old.is_null() {
            self.deleter.delete(old);
        }
    }
}

/// Owners are equal iff they hold the same address; two empties are equal.
impl<T, D: Deleter<T>> PartialEq for UniquePtr<T, D> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T, D: Deleter<T>> Eq for UniquePtr<T, D> {}

impl<T, D: Deleter<T>> fmt::Debug for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniquePtr").field("ptr", &self.ptr).finish()
    }
}

pub fn run() {
    let mut a = UniquePtr::new(String::from("owned exactly once"));
    println!("a = {:?}, pointee = {:?}", a, a.as_ref());

    // move it around - still exactly one owner
    let mut b = a.take();
    println!("after take: a empty? {}, b = {:?}", a.is_null(), b.as_ref());

    // hand the raw pointer back and re-adopt it
    let raw = b.release();
    println!("released raw {:p}, b empty? {}", raw, b.is_null());
    // SAFETY: raw came out of `release` above, nothing else owns it
    let c = unsafe { UniquePtr::<String>::from_raw(raw) };
    println!("re-adopted: {:?}", c.as_ref());
    // c frees the string here
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use super::*;

    // a drops counter to be enveloped into the pointer under test
    struct DetectDrop<'a> {
        drops: &'a Cell<usize>,
    }

    impl Drop for DetectDrop<'_> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn releases_exactly_once_across_moves() {
        let drops = Cell::new(0);
        let a = UniquePtr::new(DetectDrop { drops: &drops });
        let b = a; // plain move, a is dead now
        let mut c = b;
        let d = c.take(); // observable move, c stays around but empty
        assert!(c.is_null());
        assert_eq!(drops.get(), 0);
        drop(d);
        assert_eq!(drops.get(), 1);
        drop(c); // empty owner, nothing more to free
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn take_transfers_the_address() {
        let mut a = UniquePtr::new(7_i32);
        let before = a.get();
        let b = a.take();
        assert!(a.is_null());
        assert_eq!(b.get(), before);
        assert_eq!(b.as_ref(), Some(&7));
    }

    #[test]
    fn release_hands_ownership_back() {
        let drops = Cell::new(0);
        let mut a = UniquePtr::new(DetectDrop { drops: &drops });
        let expected = a.get();
        let raw = a.release();
        assert!(a.is_null());
        assert_eq!(raw, expected);
        // the deleter has NOT run, the caller owns raw now
        assert_eq!(drops.get(), 0);
        // SAFETY: we just took ownership via release()
        let b = unsafe { UniquePtr::<DetectDrop>::from_raw(raw) };
        drop(b);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn reset_on_empty_is_a_noop() {
        let mut a: UniquePtr<i32> = UniquePtr::null();
        a.reset();
        assert!(a.is_null());
    }

    #[test]
    fn reset_releases_then_rebinds() {
        let drops = Cell::new(0);
        let mut a = UniquePtr::new(DetectDrop { drops: &drops });
        a.reset();
        assert!(a.is_null());
        assert_eq!(drops.get(), 1);

        let next = Box::into_raw(Box::new(DetectDrop { drops: &drops }));
        // SAFETY: next is a fresh Box allocation owned by no one else
        unsafe { a.reset_with(next) };
        assert_eq!(a.get(), next);
        drop(a);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn custom_deleter_runs_instead_of_dealloc() {
        let calls = Cell::new(0);
        let raw = Box::into_raw(Box::new(42_u64));
        let deleter = FnDeleter(|p: *mut u64| {
            calls.set(calls.get() + 1);
            // SAFETY: UniquePtr calls us once, with the Box address bound below
            drop(unsafe { Box::from_raw(p) });
        });
        // SAFETY: raw is a fresh Box allocation, deleter reclaims it as a Box
        let mut a = unsafe { UniquePtr::with_deleter(raw, deleter) };
        assert_eq!(a.as_ref(), Some(&42));
        a.reset();
        assert!(a.is_null());
        assert_eq!(calls.get(), 1);
        drop(a); // deleter must not run again for the empty owner
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn null_bind_is_an_empty_owner() {
        // SAFETY: null carries no ownership at all
        let a = unsafe { UniquePtr::<i32>::from_raw(ptr::null_mut()) };
        assert!(a.is_null());
        assert_eq!(a.as_ref(), None);
        assert_eq!(a, UniquePtr::null());
    }

    #[test]
    fn equality_is_by_address() {
        let a = UniquePtr::new(1_i32);
        let b = UniquePtr::new(1_i32);
        assert_ne!(a, b); // same value, different allocations
        let empty1: UniquePtr<i32> = UniquePtr::null();
        let empty2: UniquePtr<i32> = UniquePtr::null();
        assert_eq!(empty1, empty2);
    }

    #[test]
    fn swap_exchanges_addresses_and_deleters() {
        let calls_x = Cell::new(0);
        let calls_y = Cell::new(0);

        let raw_x = Box::into_raw(Box::new('x'));
        let raw_y = Box::into_raw(Box::new('y'));
        // boxed so both owners have the same deleter type and can swap
        let del_x: FnDeleter<Box<dyn FnMut(*mut char) + '_>> = FnDeleter(Box::new(|p| {
            calls_x.set(calls_x.get() + 1);
            // SAFETY: called once with the Box address bound below
            drop(unsafe { Box::from_raw(p) });
        }));
        let del_y: FnDeleter<Box<dyn FnMut(*mut char) + '_>> = FnDeleter(Box::new(|p| {
            calls_y.set(calls_y.get() + 1);
            // SAFETY: as above
            drop(unsafe { Box::from_raw(p) });
        }));
        // SAFETY: both raws are fresh Box allocations
        let mut a = unsafe { UniquePtr::with_deleter(raw_x, del_x) };
        let mut b = unsafe { UniquePtr::with_deleter(raw_y, del_y) };

        a.swap(&mut b);
        assert_eq!(a.get(), raw_y);
        assert_eq!(b.get(), raw_x);

        // deleters travelled with the addresses: dropping a runs del_y
        drop(a);
        assert_eq!((calls_x.get(), calls_y.get()), (0, 1));
        drop(b);
        assert_eq!((calls_x.get(), calls_y.get()), (1, 1));
    }

    #[test]
    fn as_mut_reaches_the_pointee() {
        let mut a = UniquePtr::new(vec![1, 2]);
        a.as_mut().unwrap().push(3);
        assert_eq!(a.as_ref().unwrap().as_slice(), [1, 2, 3]);
        // SAFETY: a is non-empty
        assert_eq!(unsafe { a.deref() }.len(), 3);
    }
}
