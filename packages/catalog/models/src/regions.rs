//! Country and region name lookups.
//!
//! Maps the lower-level codes carried in OIDs and source records to the
//! display names used in typeahead strings. The US table covers the 50
//! states, DC, and the territories and freely associated states that the
//! National Weather Service issues zones for.

/// Two-letter codes of US territories and freely associated states.
pub const NON_STATE_TERRITORIES: &[&str] = &["AS", "FM", "GU", "MH", "MP", "PR", "PW", "VI"];

/// Every US region code with a known display name.
pub const US_REGION_CODES: &[&str] = &[
    "AK", "AL", "AR", "AS", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "FM", "GA", "GU", "HI", "IA",
    "ID", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MH", "MI", "MN", "MO", "MP", "MS", "MT",
    "NC", "ND", "NE", "NH", "NJ", "NM", "NV", "NY", "OH", "OK", "OR", "PA", "PR", "PW", "RI", "SC",
    "SD", "TN", "TX", "UT", "VA", "VI", "VT", "WA", "WI", "WV", "WY",
];

/// Maps a country code to its display name.
///
/// Case-insensitive. Returns `None` for unknown countries.
#[must_use]
pub fn country_name(country: &str) -> Option<&'static str> {
    match country.to_lowercase().as_str() {
        "us" => Some("United States"),
        _ => None,
    }
}

/// Maps a region code within a country to its display name.
///
/// Case-insensitive. Returns `None` for unknown countries or codes.
#[must_use]
pub fn region_name(country: &str, region: &str) -> Option<&'static str> {
    match country.to_lowercase().as_str() {
        "us" => us_region_name(region),
        _ => None,
    }
}

/// Maps a two-letter US state/territory code to its display name.
#[must_use]
pub fn us_region_name(code: &str) -> Option<&'static str> {
    let name = match code.to_uppercase().as_str() {
        "AK" => "Alaska",
        "AL" => "Alabama",
        "AR" => "Arkansas",
        "AS" => "American Samoa",
        "AZ" => "Arizona",
        "CA" => "California",
        "CO" => "Colorado",
        "CT" => "Connecticut",
        "DC" => "Washington, DC",
        "DE" => "Delaware",
        "FL" => "Florida",
        "FM" => "Federated States of Micronesia",
        "GA" => "Georgia",
        "GU" => "Guam",
        "HI" => "Hawaii",
        "IA" => "Iowa",
        "ID" => "Idaho",
        "IL" => "Illinois",
        "IN" => "Indiana",
        "KS" => "Kansas",
        "KY" => "Kentucky",
        "LA" => "Louisiana",
        "MA" => "Massachusetts",
        "MD" => "Maryland",
        "ME" => "Maine",
        "MH" => "Marshall Islands",
        "MI" => "Michigan",
        "MN" => "Minnesota",
        "MO" => "Missouri",
        "MP" => "Northern Mariana Islands",
        "MS" => "Mississippi",
        "MT" => "Montana",
        "NC" => "North Carolina",
        "ND" => "North Dakota",
        "NE" => "Nebraska",
        "NH" => "New Hampshire",
        "NJ" => "New Jersey",
        "NM" => "New Mexico",
        "NV" => "Nevada",
        "NY" => "New York",
        "OH" => "Ohio",
        "OK" => "Oklahoma",
        "OR" => "Oregon",
        "PA" => "Pennsylvania",
        "PR" => "Puerto Rico",
        "PW" => "Palau",
        "RI" => "Rhode Island",
        "SC" => "South Carolina",
        "SD" => "South Dakota",
        "TN" => "Tennessee",
        "TX" => "Texas",
        "UT" => "Utah",
        "VA" => "Virginia",
        "VI" => "US Virgin Islands",
        "VT" => "Vermont",
        "WA" => "Washington",
        "WI" => "Wisconsin",
        "WV" => "West Virginia",
        "WY" => "Wyoming",
        _ => return None,
    };
    Some(name)
}

/// Returns `true` for US territories and freely associated states.
#[must_use]
pub fn is_non_state_territory(code: &str) -> bool {
    NON_STATE_TERRITORIES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_count() {
        assert_eq!(US_REGION_CODES.len(), 59);
    }

    #[test]
    fn every_code_has_a_name() {
        for code in US_REGION_CODES {
            assert!(us_region_name(code).is_some(), "no name for {code}");
        }
    }

    #[test]
    fn territories_are_known_regions() {
        for code in NON_STATE_TERRITORIES {
            assert!(US_REGION_CODES.contains(code), "{code} missing");
            assert!(is_non_state_territory(&code.to_lowercase()));
        }
        assert!(!is_non_state_territory("OH"));
    }

    #[test]
    fn case_insensitive_lookups() {
        assert_eq!(region_name("US", "la"), Some("Louisiana"));
        assert_eq!(region_name("us", "Gu"), Some("Guam"));
        assert_eq!(country_name("US"), Some("United States"));
    }

    #[test]
    fn unknown_codes() {
        assert_eq!(us_region_name("ZZ"), None);
        assert_eq!(region_name("ca", "on"), None);
        assert_eq!(country_name("xx"), None);
    }
}
