//! Basic location search functionality
//!
//! This example demonstrates the fundamental operations:
//! - Creating a searcher over the bundled sample data
//! - Search-as-you-type queries by place name and postal code
//! - Postal code lookup and nearby search

use locus::data::{FramePlaceStore, sample::sample_places};
use locus::{LocationSearcher, SearchConfigBuilder, SearchResult};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let searcher = LocationSearcher::builder()
        .store(FramePlaceStore::new(sample_places()?))
        .config(SearchConfigBuilder::autocomplete().build())
        .build()?;
    let options = searcher.default_options();

    println!("Searching for 'Berl':");
    print_search_results(&searcher.search_locations("Berl", &options), 5);

    println!("\nSearching for postal code prefix '10117':");
    print_search_results(&searcher.search_locations("10117", &options), 5);

    println!("\nSearching for 'wien' in Austria:");
    print_search_results(
        &searcher.search_locations("wien", &options.clone().country("AT")),
        5,
    );

    println!("\nLooking up postal code 20095:");
    match searcher.get_by_postal_code("20095", "DE") {
        Some(result) => println!("  {} ({})", result.display_name, result.postal_code),
        None => println!("  not found"),
    }

    println!("\nPlaces within 10 km of Berlin Mitte:");
    print_search_results(
        &searcher.get_nearby_locations(52.52, 13.405, 10.0, "DE", 10),
        10,
    );

    let stats = searcher.cache_stats();
    println!(
        "\nCache: {} entries, {} hits, {} misses",
        stats.entries, stats.hits, stats.misses
    );

    Ok(())
}

fn print_search_results(results: &[SearchResult], limit: usize) {
    for (i, result) in results.iter().take(limit).enumerate() {
        let distance = result
            .distance_km
            .map(|d| format!(", {d:.1} km"))
            .unwrap_or_default();
        println!(
            "  {}. {} [{}] - Score: {:.2}{}",
            i + 1,
            result.display_name,
            result.postal_code,
            result.relevance_score,
            distance
        );
    }

    if results.len() > limit {
        println!("  ... and {} more results", results.len() - limit);
    }
}
