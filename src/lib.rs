/*
 * Hand-rolled ownership primitives over raw heap pointers:
 * - unique: move-only exclusive ownership with a pluggable deleter
 * - shared: reference-counted joint ownership, single-threaded on purpose
 */
pub mod shared;
pub mod unique;
