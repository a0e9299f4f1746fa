use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    chunk_corpus::apps::run_sample_corpus(std::env::args().skip(1))
}
