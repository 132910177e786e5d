use multizip_core::naming::ArchiveEntry;
use multizip_core::writer::ArchiveWriter;
use multizip_core::ArchiveError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::Path;

fn write_random(path: &Path, bytes: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; bytes];
    rng.fill(&mut data[..]);
    fs::write(path, &data).unwrap();
    data
}

fn entries(dir: &Path, sizes: &[usize]) -> (Vec<ArchiveEntry>, Vec<Vec<u8>>) {
    let mut out = Vec::new();
    let mut data = Vec::new();
    for (i, size) in sizes.iter().enumerate() {
        let src = dir.join(format!("f{i}.bin"));
        data.push(write_random(&src, *size, i as u64 + 1));
        out.push(ArchiveEntry { name: format!("root/sub/f{i}.bin"), source: src });
    }
    (out, data)
}

/// Accepts `budget` bytes, then fails every write like a full disk.
#[derive(Debug)]
struct FullDisk {
    inner: Cursor<Vec<u8>>,
    written: usize,
    budget: usize,
}

impl Write for FullDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.budget {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        let n = buf.len().min(self.budget - self.written);
        self.written += n;
        self.inner.write(&buf[..n])
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FullDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[test]
fn entries_round_trip_byte_for_byte_in_order() {
    let td = tempfile::tempdir().unwrap();
    let (plan, data) = entries(td.path(), &[0, 1, 70_000, 200_000]);

    let mut seen = Vec::new();
    let (cursor, outcome) = ArchiveWriter::new(4096)
        .write(&plan, Cursor::new(Vec::new()), |n| {
            seen.push(n);
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(seen, vec![1, 2, 3, 4]);
    assert_eq!(outcome.entries_written, 4);
    assert_eq!(outcome.bytes_read, 270_001);
    assert!(!outcome.stopped);
    assert_eq!(outcome.archive_bytes, cursor.get_ref().len() as u64);

    let mut za = zip::ZipArchive::new(cursor).unwrap();
    assert_eq!(za.len(), 4);
    for i in 0..za.len() {
        let mut f = za.by_index(i).unwrap();
        assert_eq!(f.name(), plan[i].name);
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, data[i]);
    }
}

#[test]
fn break_finishes_a_valid_archive_early() {
    let td = tempfile::tempdir().unwrap();
    let (plan, _) = entries(td.path(), &[10, 10, 10]);

    let (cursor, outcome) = ArchiveWriter::default()
        .write(&plan, Cursor::new(Vec::new()), |n| {
            if n == 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    assert!(outcome.stopped);
    assert_eq!(outcome.entries_written, 1);
    assert_eq!(zip::ZipArchive::new(cursor).unwrap().len(), 1);
}

#[test]
fn full_disk_aborts_the_whole_write() {
    let td = tempfile::tempdir().unwrap();
    let (plan, _) = entries(td.path(), &[256 * 1024, 256 * 1024, 256 * 1024]);
    let sink = FullDisk { inner: Cursor::new(Vec::new()), written: 0, budget: 64 * 1024 };

    let mut done = 0;
    let err = ArchiveWriter::default()
        .write(&plan, sink, |n| {
            done = n;
            ControlFlow::Continue(())
        })
        .unwrap_err();
    assert!(done < plan.len());
    assert!(
        matches!(err, ArchiveError::WriteFailed { .. } | ArchiveError::Zip { .. }),
        "unexpected error: {err}"
    );
    // Source handles are closed again: the inputs can be replaced.
    for e in &plan {
        fs::remove_file(&e.source).unwrap();
    }
}

#[test]
fn vanished_source_is_reported_with_its_path() {
    let td = tempfile::tempdir().unwrap();
    let (plan, _) = entries(td.path(), &[10, 10]);
    fs::remove_file(&plan[1].source).unwrap();

    let dest = td.path().join("out.zip");
    let err = ArchiveWriter::default()
        .write_to_path(&plan, &dest, |_| ControlFlow::Continue(()))
        .unwrap_err();
    match err {
        ArchiveError::SourceUnreadable { path, .. } => assert_eq!(path, plan[1].source),
        other => panic!("unexpected error: {other}"),
    }
    // The partial archive stays behind.
    assert!(dest.exists());
}

#[test]
fn write_to_path_truncates_existing_destination() {
    let td = tempfile::tempdir().unwrap();
    let (plan, data) = entries(td.path(), &[1234]);
    let dest = td.path().join("out.zip");
    fs::write(&dest, vec![0xAAu8; 1 << 20]).unwrap();

    let outcome = ArchiveWriter::default()
        .write_to_path(&plan, &dest, |_| ControlFlow::Continue(()))
        .unwrap();
    assert_eq!(fs::metadata(&dest).unwrap().len(), outcome.archive_bytes);

    let mut za = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
    let mut buf = Vec::new();
    za.by_name("root/sub/f0.bin").unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, data[0]);
}
