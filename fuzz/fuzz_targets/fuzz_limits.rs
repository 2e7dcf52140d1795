#![no_main]
use libfuzzer_sys::fuzz_target;
use spc_core::Limits;

fuzz_target!(|input: (f64, f64, f64)| {
    let (ucl, lcl, value) = input;
    match Limits::new(ucl, lcl) {
        Ok(l) => {
            assert!(ucl.is_finite() && lcl.is_finite() && ucl >= lcl);
            if value.is_finite() && value >= lcl && value <= ucl {
                assert!(!l.violated_by(value));
            }
        }
        Err(_) => assert!(!(ucl.is_finite() && lcl.is_finite() && ucl >= lcl)),
    }
});
