//! File and stream plumbing: transparent gzip on input, transparent gzip or
//! stdout on output. A `.gz` input is decoded on a background thread through
//! an anonymous pipe so the main thread never blocks on the decoder; a
//! plain file is read directly.

use crate::error::TrimError;
use crate::utils::whichever::define_whichever;
use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
use std::{
    fs::File,
    io::{BufWriter, PipeReader, Stdout, stdout},
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
};
use zoe::data::err::WithErrorContext;
use zoe::prelude::FastQReader;

define_whichever! {
    #[allow(clippy::large_enum_variant)]
    #[doc="The two kinds of input byte stream a FASTQ reader can be backed by."]
    pub(crate) enum ReadFileZip {
        #[doc="A regular uncompressed file"]
        File(File),
        #[doc="A gzip-compressed file, decoded on a background thread through an anonymous pipe"]
        Zipped(PipeReader),
    }

    impl Read for ReadFileZip {}
}

/// The `FastQReader` used throughout the pipeline, generic over compression.
pub type FastQReaderGz = FastQReader<ReadFileZip>;

define_whichever! {
    #[doc="The three kinds of output byte stream a FASTQ writer can target."]
    #[derive(Debug)]
    pub(crate) enum WriteFileZipStdout {
        #[doc="A regular uncompressed file"]
        File(BufWriter<File>),
        #[doc="A gzip-compressed file"]
        Zipped(GzEncoder<BufWriter<File>>),
        #[doc="Uncompressed data to stdout"]
        Stdout(BufWriter<Stdout>),
    }

    impl Write for WriteFileZipStdout {}
}

fn is_gz(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Opens a single FASTQ file, transparently decoding gzip in a background
/// thread when the extension ends in `.gz`.
pub(crate) fn open_fastq_file(path: &Path) -> Result<(FastQReaderGz, Option<IoThread>), TrimError> {
    let open = |e: std::io::Error| TrimError::IoOpen(e.with_file_context("Failed to open FASTQ file", path));

    if is_gz(path) {
        let (pipe, thread) = spawn_decoder(path).map_err(open)?;
        let reader = FastQReader::from_readable(ReadFileZip::Zipped(pipe)).map_err(open)?;
        Ok((reader, Some(thread)))
    } else {
        let file = File::open(path).map_err(open)?;
        let reader = FastQReader::from_readable(ReadFileZip::File(file)).map_err(open)?;
        Ok((reader, None))
    }
}

/// Creates a writer targeting `path`, or stdout if `path` is `None`. Gzips
/// transparently when the path ends in `.gz`.
pub(crate) fn create_writer(path: Option<&Path>) -> Result<WriteFileZipStdout, TrimError> {
    let writer = match path {
        Some(p) => {
            let file = File::create(p).map_err(|e| TrimError::IoOpen(e.with_file_context("Failed to create file for writing", p)))?;
            let buf_writer = BufWriter::new(file);
            if is_gz(p) {
                WriteFileZipStdout::Zipped(GzEncoder::new(buf_writer, Compression::default()))
            } else {
                WriteFileZipStdout::File(buf_writer)
            }
        }
        None => WriteFileZipStdout::Stdout(BufWriter::new(stdout())),
    };

    Ok(writer)
}

/// Spawns a thread decoding `file_path` with [`MultiGzDecoder`], streaming
/// the plaintext back through a pipe.
fn spawn_decoder(file_path: &Path) -> std::io::Result<(std::io::PipeReader, IoThread)> {
    let (reader, mut writer) = std::io::pipe()?;
    let mut decoder = MultiGzDecoder::new(File::open(file_path)?);

    let thread = thread::spawn(move || -> std::io::Result<_> {
        std::io::copy(&mut decoder, &mut writer)?;
        Ok(())
    });

    Ok((reader, thread))
}

/// Handle for a background decoder thread.
pub(crate) type IoThread = JoinHandle<std::io::Result<()>>;

/// Joins every decoder thread started for a run, surfacing the first error.
pub(crate) fn finalize_threads(threads: Vec<(IoThread, PathBuf)>) -> Result<(), TrimError> {
    for (thread, path) in threads {
        thread
            .join()
            .expect("decoder thread panicked")
            .map_err(|e| TrimError::IoRead(e.with_file_context("Failed to decode gzip stream", &path)))?;
    }
    Ok(())
}
