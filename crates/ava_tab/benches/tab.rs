use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

pub mod read {
    use ava_tab::{
        write::{ArchivePairWriter, ArchivePairWriterOptions},
        ArchiveTable, Codec, CompressionKind, TableFormat,
    };
    use divan::Bencher;
    use std::io::{Cursor, Write};

    const ENTRIES: u32 = 4096;

    fn get_input() -> (Vec<u8>, Vec<u8>) {
        let mut pair = ArchivePairWriter::new(
            Cursor::new(Vec::new()),
            Vec::new(),
            ArchivePairWriterOptions::builder().build(),
        );
        for i in 0..ENTRIES {
            pair.start_file_hash(i, CompressionKind::Zlib).unwrap();
            pair.write_all(format!("entry number {i} ").repeat(8).as_bytes())
                .unwrap();
        }
        let (index, data) = pair.finish().unwrap();
        (index.into_inner(), data)
    }

    #[divan::bench]
    fn parse(bencher: Bencher) {
        bencher
            .with_inputs(|| get_input().0)
            .bench_refs(|index| {
                divan::black_box(ArchiveTable::parse(index, TableFormat::Current).unwrap());
            });
    }

    #[divan::bench(sample_count = 1)]
    fn read_entry_all(bencher: Bencher) {
        let (index, data) = get_input();
        let table = ArchiveTable::parse(&index, TableFormat::Current).unwrap();
        let mut reader = Cursor::new(data);
        let codec = Codec::new();

        bencher.bench_local(move || {
            for i in 0..ENTRIES {
                divan::black_box(table.read_entry(&mut reader, i, &codec).unwrap());
            }
        });
    }
}
