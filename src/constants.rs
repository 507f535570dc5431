/// Source name constants to ensure consistency across the codebase

// Source names (used in CLI and export filenames)
pub const NTSB_SOURCE: &str = "ntsb";
pub const ASN_SOURCE: &str = "asn";

/// NTSB CAROL public query endpoint
pub const NTSB_ENDPOINT: &str =
    "https://data.ntsb.gov/carol-main-public/api/Query/GetResultsByPage";

/// Base URL for NTSB record detail links
pub const NTSB_DETAIL_URL: &str =
    "https://data.ntsb.gov/carol-main-public/basic-search/result";

/// Aviation Safety Network year listing
pub const ASN_LISTING_URL: &str = "https://aviation-safety.net/database/dblist.php";

/// Prefix for ASN detail links found in the listing table
pub const ASN_BASE_URL: &str = "https://aviation-safety.net";

pub const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; CrashDatabaseResearch/1.0; +http://yourdomain.com/contact)";

/// Get all supported source names
pub fn supported_sources() -> Vec<&'static str> {
    vec![NTSB_SOURCE, ASN_SOURCE]
}
