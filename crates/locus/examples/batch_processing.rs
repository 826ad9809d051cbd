//! Batch processing for bulk lookups
//!
//! Runs a list of queries through `search_locations_bulk`, compares it with
//! one-by-one searching and prints the JSON an HTTP layer would return.

use std::time::Instant;

use locus::data::sample::{SampleConfig, sample_parquet};
use locus::data::ParquetPlaceStore;
use locus::{IndexLocation, LocationSearcher, SearchConfigBuilder, SearchOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = locus::init_logging(tracing::Level::INFO);

    // Materialise the sample data the way the import pipeline would
    let places = sample_parquet(&SampleConfig::default())?;
    let searcher = LocationSearcher::builder()
        .store(ParquetPlaceStore::from_path(places.path()))
        .config(SearchConfigBuilder::exhaustive().build())
        .index_location(IndexLocation::InMemory)
        .build()?;

    let queries = [
        "berl", "10117", "hamburg", "münchen", "köln", "main", "hamburk", "x",
    ];
    let options = SearchOptions::default().max_results(3);

    println!("Processing {} queries...", queries.len());

    let start = Instant::now();
    let individual: Vec<_> = queries
        .iter()
        .map(|q| searcher.search_locations(q, &options))
        .collect();
    let individual_time = start.elapsed();

    searcher.clear_cache();

    let start = Instant::now();
    let batch = searcher.search_locations_bulk(&queries, &options);
    let batch_time = start.elapsed();

    println!("  Individual: {:.3}s", individual_time.as_secs_f32());
    println!("  Batch:      {:.3}s", batch_time.as_secs_f32());
    assert_eq!(individual, batch);

    for (query, results) in queries.iter().zip(&batch) {
        println!("\n{query:?}: {} results", results.len());
        for result in results {
            println!("  {}", serde_json::to_string(result)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_processing_example() {
        assert!(
            main().is_ok(),
            "Batch processing example should run successfully"
        );
    }
}
