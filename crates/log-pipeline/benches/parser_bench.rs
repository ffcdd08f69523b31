//! dnsmasq 파서/상관기 벤치마크
//!
//! 라인 분류와 query/reply 상관 처리량을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use netwatch_log_pipeline::{Correlator, DnsmasqParser};

const QUERY: &str =
    "May 24 12:00:03 router dnsmasq[126]: query[A] www.example.com from 192.168.0.10";
const REPLY: &str = "May 24 12:00:03 router dnsmasq[126]: reply www.example.com is 93.184.216.34";
const ACK: &str = "May 24 12:00:00 router dnsmasq-dhcp[123]: DHCPACK(eth0) 192.168.0.10 00:11:22:33:44:55 laptop";
/// 어떤 패턴과도 일치하지 않는 라인 (실제 syslog의 대부분)
const NOISE: &str = "May 24 12:00:00 router kernel: [12345.678901] br0: port 2(wlan0) entered forwarding state";

fn bench_parse_line(c: &mut Criterion) {
    let parser = DnsmasqParser::new().unwrap();
    let mut group = c.benchmark_group("dnsmasq_parse");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [("query", QUERY), ("reply", REPLY), ("ack", ACK), ("noise", NOISE)] {
        group.bench_function(name, |b| b.iter(|| parser.parse(black_box(line))));
    }

    group.finish();
}

fn bench_correlate(c: &mut Criterion) {
    let lines: Vec<&str> = (0..250)
        .flat_map(|_| [QUERY, REPLY, NOISE, ACK])
        .collect();

    let mut group = c.benchmark_group("correlator");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("mixed_1000", |b| {
        b.iter(|| {
            let mut correlator = Correlator::new(DnsmasqParser::new().unwrap(), "bench");
            let mut emitted = 0usize;
            for line in &lines {
                emitted += correlator.feed(black_box(line)).len();
            }
            emitted
        })
    });
    group.finish();
}

criterion_group!(benches, bench_parse_line, bench_correlate);
criterion_main!(benches);
