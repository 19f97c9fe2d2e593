//! Benchmarks for inbound frame parsing and outbound command encoding
//!
//! Target: <200ns per frame parse

use chat_idle::irc::{parse_frame, Command};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

// Real server frame formats
const PING: &str = "PING :tmi.twitch.tv\r\n";

const WELCOME: &str = ":tmi.twitch.tv 001 idler :Welcome, GLHF!\r\n";

const JOIN: &str = ":idler!idler@idler.tmi.twitch.tv JOIN #somechannel\r\n";

const PRIVMSG: &str = ":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #somechannel :hello there idler, how is the stream going today?\r\n";

fn bench_frame_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_parse");

    for (name, line) in [("ping", PING), ("welcome", WELCOME), ("join", JOIN), ("privmsg", PRIVMSG)] {
        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let frame = parse_frame(black_box(line));
                black_box(frame);
            })
        });
    }

    group.finish();
}

fn bench_malformed_parse(c: &mut Criterion) {
    c.bench_function("frame_parse/malformed", |b| {
        b.iter(|| {
            let frame = parse_frame(black_box("garbage\r\n"));
            black_box(frame);
        })
    });
}

fn bench_command_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_encode");

    group.bench_function("join", |b| {
        let mut buf = String::with_capacity(64);
        b.iter(|| {
            buf.clear();
            Command::Join(black_box("somechannel")).write_to(&mut buf);
            black_box(&buf);
        })
    });

    group.bench_function("login", |b| {
        let mut buf = String::with_capacity(128);
        b.iter(|| {
            buf.clear();
            for command in [
                Command::Pass(black_box("oauth:secret")),
                Command::Nick(black_box("idler")),
                Command::User(black_box("idler")),
            ] {
                command.write_to(&mut buf);
            }
            black_box(&buf);
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_parse,
    bench_malformed_parse,
    bench_command_encode
);
criterion_main!(benches);
