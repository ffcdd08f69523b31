#![no_main]

use libfuzzer_sys::fuzz_target;
use netwatch_core::event::NetworkEvent;
use netwatch_log_pipeline::{Correlator, DnsmasqParser};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let Ok(parser) = DnsmasqParser::new() else {
        return;
    };
    let mut correlator = Correlator::new(parser, "fuzz");

    let mut events: Vec<NetworkEvent> = Vec::new();
    for line in text.lines() {
        events.extend(correlator.feed(line));
    }
    events.extend(correlator.flush());

    // flush 이후에는 대기 중인 요청이 남지 않아야 한다
    assert!(!correlator.has_pending());
});
