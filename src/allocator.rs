/// Short code for the next mapping given how many are already stored.
///
/// Codes start at 1 and stay dense as long as callers hold the store's
/// insert lock between reading the count and writing the mapping.
pub fn allocate_next(current_count: i64) -> i64 {
    current_count + 1
}
