#![no_main]

use covbase::covariate::{RawDeclaration, TimePeriod};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Accepted periods must stay inside the day and round-trip through their label
        if let Ok(period) = TimePeriod::parse(input) {
            assert!(period.end_minute() <= 24 * 60);
            assert_eq!(TimePeriod::parse(&period.label()).ok(), Some(period));
        }

        // Whole declarations must reject, never panic
        let _ = toml::from_str::<RawDeclaration>(input)
            .map(|raw| covbase::covariate::CovariateDeclaration::from_raw(&raw));
    }
});
