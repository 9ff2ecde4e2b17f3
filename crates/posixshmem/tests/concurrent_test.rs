use posixshmem::size::set_size;
use posixshmem::{
    ErrorKind, RetryConfig, SegmentDescriptor, SegmentName, SegmentOptions, SharedMemorySegment,
    unlink,
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_name(tag: &str) -> String {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/posixshmem_cc_{tag}_{}_{id}", std::process::id())
}

/// Sequence counter the test places at offset 0 of the segment.
///
/// The library only hands out bytes; publishing with Release and observing
/// with Acquire is the caller's own coordination.
fn sequence(segment: &SharedMemorySegment) -> &AtomicU64 {
    let buffer = segment.buffer().unwrap();
    assert!(buffer.len() >= 8);
    // SAFETY: mappings are page aligned and outlive the returned reference
    unsafe { &*(buffer.as_ptr() as *const AtomicU64) }
}

/// Test concurrent producer-consumer pattern over independent handles
///
/// Tests:
/// - Each thread owns its own descriptor and mapping of one name
/// - Consumer attaching before the producer exists (attach_with_retry)
/// - Payload published before the sequence is visible to the consumer
#[test]
fn test_concurrent_producer_consumer() {
    let name = unique_name("producer_consumer");

    const NUM_FRAMES: u64 = 30;
    const FRAME_SIZE: usize = 256;

    let producer_name = name.clone();
    let consumer_name = name.clone();

    // Consumer starts first and waits for the segment to appear
    let consumer = thread::spawn(move || {
        let config = RetryConfig {
            max_attempts: 200,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        let segment = SharedMemorySegment::attach_with_retry(
            &consumer_name,
            &SegmentOptions::default(),
            &config,
        )
        .unwrap();

        let mut frames_seen = Vec::new();
        let mut last_seq = 0;
        let start = Instant::now();

        while last_seq < NUM_FRAMES {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "Consumer timeout: only saw {} frames",
                frames_seen.len()
            );

            let seq = sequence(&segment).load(Ordering::Acquire);
            if seq > last_seq {
                let payload = segment.read_at(8, 8).unwrap();
                let frame_num = u64::from_le_bytes(payload.try_into().unwrap());
                assert!(
                    frame_num >= seq,
                    "Payload {frame_num} must be visible once sequence {seq} is"
                );
                frames_seen.push(seq);
                last_seq = seq;
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }

        frames_seen
    });

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let mut segment = SharedMemorySegment::create(&producer_name, FRAME_SIZE + 8).unwrap();

        for i in 1..=NUM_FRAMES {
            segment.write_at(8, &i.to_le_bytes()).unwrap();
            sequence(&segment).store(i, Ordering::Release);

            thread::sleep(Duration::from_millis(10));
        }

        segment
    });

    let frames_seen = consumer.join().expect("Consumer thread panicked");
    let segment = producer.join().expect("Producer thread panicked");

    // A slow consumer may skip frames but never sees them out of order
    assert_eq!(frames_seen.last(), Some(&NUM_FRAMES));
    assert!(
        frames_seen.windows(2).all(|w| w[0] < w[1]),
        "Frames should be strictly increasing"
    );

    segment.unlink().unwrap();
}

/// Test multiple attached handles observe the same writes
///
/// Simulates several consumers attached to one producer
#[test]
fn test_multiple_concurrent_readers() {
    let name = unique_name("multi_reader");

    const NUM_WRITES: usize = 50;

    let mut writer = SharedMemorySegment::create(&name, 1024).unwrap();
    let readers: Vec<_> = (0..3)
        .map(|_| SharedMemorySegment::attach(&name).unwrap())
        .collect();

    for i in 1..=NUM_WRITES {
        let data = format!("frame_{i}");
        writer.write_at(0, data.as_bytes()).unwrap();

        for (idx, reader) in readers.iter().enumerate() {
            assert_eq!(
                reader.read_at(0, data.len()).unwrap(),
                data.as_bytes(),
                "Reader {idx} should see frame {i}"
            );
        }
    }

    unlink(&name).unwrap();
}

/// Test handles can move to and be closed from other threads
#[test]
fn test_handles_are_send() {
    let name = unique_name("send");

    let mut segment = SharedMemorySegment::create(&name, 64).unwrap();
    segment.write_at(0, b"moved").unwrap();

    let handle = thread::spawn(move || {
        let attached = SharedMemorySegment::attach(&name).unwrap();
        assert_eq!(attached.read_at(0, 5).unwrap(), b"moved");
        segment.close().unwrap();
        segment.unlink().unwrap_err();
        attached.unlink().unwrap();
    });

    handle.join().expect("Worker thread panicked");
}

/// Test attach_with_retry waits while the object exists but is still empty
///
/// The creator has opened the name but not sized it yet: plain attach sees a
/// zero-length object, the retrying attach must keep polling until it grows.
#[test]
fn test_attach_with_retry_waits_for_sizing() {
    let name = unique_name("await_sizing");
    let segment_name = SegmentName::new(&name).unwrap();

    let pending = SegmentDescriptor::open_create(&segment_name, 0o600).unwrap();

    let attacher_name = name.clone();
    let attacher = thread::spawn(move || {
        let config = RetryConfig {
            max_attempts: 200,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        SharedMemorySegment::attach_with_retry(&attacher_name, &SegmentOptions::default(), &config)
    });

    thread::sleep(Duration::from_millis(30));
    set_size(&pending, 128).unwrap();

    let attached = attacher
        .join()
        .expect("Attacher thread panicked")
        .unwrap();
    assert_eq!(attached.size(), 128);
    assert!(!attached.is_created());

    unlink(&name).unwrap();
}

/// Test attach_with_retry reports InvalidSize when the object never gets sized
#[test]
fn test_attach_with_retry_gives_up_on_unsized_segment() {
    let name = unique_name("never_sized");
    let segment_name = SegmentName::new(&name).unwrap();

    let _pending = SegmentDescriptor::open_create(&segment_name, 0o600).unwrap();

    let config = RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_micros(10),
        max_delay: Duration::from_micros(50),
    };
    let result =
        SharedMemorySegment::attach_with_retry(&name, &SegmentOptions::default(), &config);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidSize);

    unlink(&name).unwrap();
}

/// Async attach waits for a creator running on another thread
#[cfg(feature = "tokio")]
#[tokio::test]
async fn test_attach_with_retry_async_waits_for_creator() {
    let name = unique_name("async_retry");
    let creator_name = name.clone();

    let creator = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        let mut segment = SharedMemorySegment::create(&creator_name, 32).unwrap();
        segment.write_at(0, b"ready").unwrap();
        segment
    });

    let config = RetryConfig {
        max_attempts: 100,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
    };
    let attached =
        SharedMemorySegment::attach_with_retry_async(&name, &SegmentOptions::default(), &config)
            .await
            .unwrap();

    let _creator = creator.join().expect("Creator thread panicked");
    assert_eq!(attached.read_at(0, 5).unwrap(), b"ready");

    unlink(&name).unwrap();
}
