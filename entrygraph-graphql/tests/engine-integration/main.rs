pub mod fixtures;

mod test_generate;
mod test_mutations;
