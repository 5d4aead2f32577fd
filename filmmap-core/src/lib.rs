// Internal modules (private)
mod aggregator;
mod cache;
mod geocoding;
mod listing;
mod map_render;
mod pipeline;
mod resolver;
mod selector;

// Re-export public types
pub use aggregator::{LocationIndex, LABEL_SEPARATOR};
pub use cache::{read_records, CacheError, CacheWriter, FilmRecord, CACHE_HEADER, UNKNOWN_YEAR};
pub use geocoding::{Coordinates, GeocodeError, Geocoder, GeocoderConfig, HttpGeocoder, Provider};
pub use listing::{
    data_lines, escape_html, parse_line, read_listing, DecodePolicy, ListingEntry, ListingError,
    RawLine, HEADER_MARKER,
};
pub use map_render::{render_map, write_map, MapOptions};
pub use pipeline::{
    cache_is_fresh, convert_listing, ensure_cache, CacheFreshness, ConversionSummary,
    PipelineOptions, RecordErrorPolicy,
};
pub use resolver::{ResolveError, Resolver, RetryPolicy, UnresolvedReason};
pub use selector::{
    decade_bounds, is_valid_year, select, select_from_cache, year_counts, Selection,
    DECADE_BASE_YEAR, MAX_YEAR, MIN_YEAR,
};
