use num_format::{Locale, ToFormattedString};
use seqcast::{Reader, RingBuffer, Writer};
use std::time::{Duration, Instant};

// Saturation throughput: one publisher hammering the ring at full speed, one
// consumer counting deliveries and failed polls.

const RING_CAPACITY: usize = 1024 * 1024;
const REPORT_EVERY: usize = 10_000_000;

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Record {
    seq: u64,
    bid: u64,
    ask: u64,
    flags: u64,
}

struct Publisher<'a> {
    writer: Writer<'a, Record>,
}

impl<'a> Publisher<'a> {
    fn new(writer: Writer<'a, Record>) -> Self {
        Self { writer }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let mut seq = 0u64;
        loop {
            self.writer.write(Record {
                seq,
                bid: seq + 1,
                ask: seq + 2,
                flags: 0,
            });
            seq += 1;
        }
    }
}

struct Consumer<'a> {
    reader: Reader<'a, Record>,
    msg_count: usize,
    miss_count: usize,
    start_time: Instant,
}

impl<'a> Consumer<'a> {
    fn new(reader: Reader<'a, Record>) -> Self {
        Self {
            reader,
            msg_count: 0,
            miss_count: 0,
            start_time: Instant::now(),
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let mut result = Record::default();
        loop {
            if self.reader.try_read(&mut result) {
                self.msg_count += 1;
            } else {
                self.miss_count += 1;
            }

            if self.msg_count >= REPORT_EVERY {
                let elapsed = self.start_time.elapsed().as_nanos() as u64;
                let messages_per_sec = (self.msg_count * 1_000_000_000) as u64 / elapsed;

                println!(
                    "{}ms {} msgs/sec messages: {} misses: {}",
                    Duration::from_nanos(elapsed).as_millis(),
                    messages_per_sec.to_formatted_string(&Locale::en),
                    self.msg_count,
                    self.miss_count
                );
                self.msg_count = 0;
                self.miss_count = 0;
                self.start_time = Instant::now();
            }
        }
    }
}

fn main() {
    let ring = RingBuffer::<Record>::new(RING_CAPACITY).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let writer = ring.writer().unwrap();
            let mut publisher = Publisher::new(writer);
            publisher.run().unwrap()
        });

        scope.spawn(|| {
            let reader = ring.reader();
            let mut consumer = Consumer::new(reader);
            consumer.run().unwrap()
        });
    });
}
