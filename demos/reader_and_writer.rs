use anyhow::Result;
use rand::{thread_rng, Rng};
use seqcast::{Reader, RingBuffer, Writer};
use std::time::Duration;

/// This demo shows a writer and a reader communicating through a shared ring
/// that are running on separate threads.

const RING_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
struct Quote {
    symbol: u8,
    bid: u64,
    ask: u64,
}

/// Publish a random quote every millisecond. The ask is derived from the bid
/// so the reader can validate what it receives.
fn writer(mut writer: Writer<'_, Quote>) {
    loop {
        let symbol = thread_rng().gen_range(b'A'..=b'Z');
        let bid = thread_rng().gen_range(1..10_000u64);
        writer.write(Quote {
            symbol,
            bid,
            ask: bid + u64::from(symbol),
        });
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Consume quotes produced by the writer, validating the bid/ask relation and
/// sleeping between polls in order to process records in a batch.
fn reader(mut reader: Reader<'_, Quote>) -> Result<()> {
    loop {
        let mut count = 0;
        while let Some(quote) = reader.receive_next() {
            assert_eq!(quote.ask, quote.bid + u64::from(quote.symbol));
            println!("{} {}/{}", quote.symbol as char, quote.bid, quote.ask);
            count += 1;
        }
        if count > 0 {
            println!("batch_size: {}", count);
        }
        // adding delay here to simulate impact of batching
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn main() -> Result<()> {
    let ring = RingBuffer::<Quote>::new(RING_CAPACITY)?;

    std::thread::scope(|scope| {
        scope.spawn(|| writer(ring.writer().unwrap()));
        scope.spawn(|| {
            // delay for a bit so the writer is already ahead when we attach
            std::thread::sleep(Duration::from_secs(1));
            reader(ring.reader()).unwrap();
        });
    });

    Ok(())
}
