pub mod funcs;
pub mod traits;
#[cfg(test)]
pub mod testing;
