#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use netwatch_log_pipeline::DnsmasqParser;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(parser) = DnsmasqParser::new() else {
        return;
    };

    // 1월 1일 근처: 연도 보정 경로까지 닿도록 기준 시각 고정
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap();

    // 크래시나 패닉 없이 Some 또는 None을 반환해야 한다
    let _ = parser.parse_at(line, now);
});
