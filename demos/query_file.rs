use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    tablecache::apps::run_query_file(std::env::args().skip(1))
}
