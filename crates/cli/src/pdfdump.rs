//! pdfdump - Dump PDF file structure as XML
//!
//! Prints the trailer, selected objects or pages, the outline, or a short
//! summary of how the file was read. Can also extract a page range into a
//! new file.

use anyhow::{Context, bail};
use clap::{ArgAction, ArgGroup, Parser};
use lectern_core::document::{OutlineItem, PdfReader, ReaderOptions, WriterOptions};
use lectern_core::model::{ObjRef, PdfDict, PdfObject};
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Page number of every page object, for outline destinations.
struct PageIndex(HashMap<u32, usize>);

impl PageIndex {
    fn new(refs: impl IntoIterator<Item = (usize, ObjRef)>) -> Self {
        Self(refs.into_iter().map(|(n, r)| (r.num, n)).collect())
    }

    fn get(&self, r: ObjRef) -> Option<usize> {
        self.0.get(&r.num).copied()
    }
}

/// Escape special characters for XML output.
fn escape(s: &[u8]) -> String {
    let mut result = String::new();
    for &byte in s {
        match byte {
            b'&' => result.push_str("&amp;"),
            b'<' => result.push_str("&lt;"),
            b'>' => result.push_str("&gt;"),
            b'"' => result.push_str("&quot;"),
            b'\'' => result.push_str("&#39;"),
            b'\\' => result.push_str("&#92;"),
            0..=31 | 127..=255 => {
                result.push_str(&format!("&#{byte};"));
            }
            _ => result.push(byte as char),
        }
    }
    result
}

fn escape_str(s: &str) -> String {
    escape(s.as_bytes())
}

/// Stream codec for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCodec {
    None,
    Raw,
    Binary,
    Text,
}

/// Dump a PDF object as XML.
fn dumpxml<W: Write>(
    out: &mut W,
    reader: &mut PdfReader,
    obj: &PdfObject,
    codec: StreamCodec,
) -> anyhow::Result<()> {
    match obj {
        PdfObject::Null => write!(out, "<null />")?,
        PdfObject::Boolean(b) => write!(out, "<boolean>{b}</boolean>")?,
        PdfObject::Number(n) => write!(out, "<number>{n}</number>")?,
        PdfObject::String(s) => write!(
            out,
            r#"<string size="{}">{}</string>"#,
            s.bytes.len(),
            escape(&s.bytes)
        )?,
        PdfObject::Name(name) => write!(out, "<literal>{}</literal>", escape_str(name))?,
        PdfObject::Array(arr) => {
            writeln!(out, r#"<list size="{}">"#, arr.len())?;
            for item in arr {
                dumpxml(out, reader, item, codec)?;
                writeln!(out)?;
            }
            write!(out, "</list>")?;
        }
        PdfObject::Dictionary(dict) => dumpdict(out, reader, dict, codec)?,
        PdfObject::Stream(stream) => match codec {
            StreamCodec::Raw => out.write_all(&reader.get_stream_bytes_raw(stream))?,
            StreamCodec::Binary => out.write_all(&reader.get_stream_bytes(stream)?)?,
            StreamCodec::Text | StreamCodec::None => {
                writeln!(out, "<stream>")?;
                writeln!(out, "<props>")?;
                dumpdict(out, reader, &stream.dict, codec)?;
                writeln!(out)?;
                writeln!(out, "</props>")?;
                if codec == StreamCodec::Text {
                    let data = reader.get_stream_bytes(stream)?;
                    writeln!(
                        out,
                        r#"<data size="{}">{}</data>"#,
                        data.len(),
                        escape(&data)
                    )?;
                }
                write!(out, "</stream>")?;
            }
        },
        PdfObject::Reference(r) => write!(out, r#"<ref id="{}" />"#, r.num)?,
    }
    Ok(())
}

fn dumpdict<W: Write>(
    out: &mut W,
    reader: &mut PdfReader,
    dict: &PdfDict,
    codec: StreamCodec,
) -> anyhow::Result<()> {
    writeln!(out, r#"<dict size="{}">"#, dict.len())?;
    for (k, v) in dict {
        writeln!(out, "<key>{}</key>", escape_str(k))?;
        write!(out, "<value>")?;
        dumpxml(out, reader, v, codec)?;
        writeln!(out, "</value>")?;
    }
    write!(out, "</dict>")?;
    Ok(())
}

fn dumptrailer<W: Write>(out: &mut W, reader: &mut PdfReader) -> anyhow::Result<()> {
    let trailer = reader.trailer().clone();
    writeln!(out, "<trailer>")?;
    dumpdict(out, reader, &trailer, StreamCodec::None)?;
    writeln!(out)?;
    writeln!(out, "</trailer>")?;
    writeln!(out)?;
    Ok(())
}

/// Dump every live object, then the trailer.
fn dumpallobjs<W: Write>(
    out: &mut W,
    reader: &mut PdfReader,
    codec: StreamCodec,
) -> anyhow::Result<()> {
    write!(out, "<pdf>")?;
    for num in reader.live_numbers() {
        match reader.get_pdf_object(ObjRef::new(num, 0)) {
            Ok(obj) => {
                writeln!(out, r#"<object id="{num}">"#)?;
                dumpxml(out, reader, &obj, codec)?;
                writeln!(out)?;
                writeln!(out, "</object>")?;
                writeln!(out)?;
            }
            Err(e) => eprintln!("not found: object {num} - {e}"),
        }
    }
    dumptrailer(out, reader)?;
    write!(out, "</pdf>")?;
    Ok(())
}

fn dumpoutline<W: Write>(out: &mut W, reader: &mut PdfReader) -> anyhow::Result<()> {
    let pages = PageIndex::new(
        (1..=reader.number_of_pages())
            .filter_map(|n| reader.get_page_ref(n).ok().map(|r| (n, r))),
    );
    writeln!(out, "<outlines>")?;
    for item in reader.outlines()? {
        dump_outline_item(out, reader, &item, &pages)?;
    }
    writeln!(out, "</outlines>")?;
    Ok(())
}

fn dump_outline_item<W: Write>(
    out: &mut W,
    reader: &mut PdfReader,
    item: &OutlineItem,
    pages: &PageIndex,
) -> anyhow::Result<()> {
    writeln!(
        out,
        r#"<outline level="{}" title="{}">"#,
        item.level,
        escape_str(&item.title)
    )?;
    // explicit destinations only; named ones need the name tree
    let target = item.dest.clone().or_else(|| {
        item.action
            .as_ref()
            .filter(|a| a.get_name("S") == Some("GoTo"))
            .and_then(|a| a.get("D").cloned())
    });
    if let Some(dest) = &item.dest {
        write!(out, "<dest>")?;
        dumpxml(out, reader, dest, StreamCodec::None)?;
        writeln!(out, "</dest>")?;
    }
    if let Some(PdfObject::Array(items)) = target
        && let Some(PdfObject::Reference(page)) = items.first()
        && let Some(pageno) = pages.get(*page)
    {
        writeln!(out, "<pageno>{pageno}</pageno>")?;
    }
    writeln!(out, "</outline>")?;
    Ok(())
}

fn dumpinfo<W: Write>(out: &mut W, reader: &mut PdfReader) -> anyhow::Result<()> {
    let xref = match (reader.is_new_xref_type(), reader.is_hybrid_xref()) {
        (_, true) => "hybrid",
        (true, false) => "stream",
        (false, false) => "table",
    };
    writeln!(out, "<info>")?;
    writeln!(out, "<version>{}</version>", escape_str(reader.version()))?;
    writeln!(out, "<pages>{}</pages>", reader.number_of_pages())?;
    writeln!(out, "<objects>{}</objects>", reader.xref_size())?;
    writeln!(out, "<xref>{xref}</xref>")?;
    writeln!(out, "<rebuilt>{}</rebuilt>", reader.is_rebuilt())?;
    writeln!(out, "<encrypted>{}</encrypted>", reader.is_encrypted())?;
    if let Some(mode) = reader.crypto_mode() {
        writeln!(out, "<crypto>{mode:?}</crypto>")?;
        writeln!(out, "<permissions>{}</permissions>", reader.permissions())?;
    }
    for (key, value) in reader.info()? {
        writeln!(out, r#"<entry key="{}">{}</entry>"#, escape_str(&key), escape_str(&value))?;
    }
    writeln!(out, "</info>")?;
    Ok(())
}

/// Dump selected objects and pages, or the trailer when nothing is selected.
fn dumppdf<W: Write>(
    out: &mut W,
    reader: &mut PdfReader,
    objids: &[u32],
    pagenos: &[usize],
    codec: StreamCodec,
) -> anyhow::Result<()> {
    for &num in objids {
        match reader.get_pdf_object(ObjRef::new(num, 0)) {
            Ok(obj) => dumpxml(out, reader, &obj, codec)?,
            Err(e) => eprintln!("not found: object {num} - {e}"),
        }
    }

    for &pageno in pagenos {
        let page = match reader.get_page_n(pageno) {
            Ok(page) => page,
            Err(e) => {
                eprintln!("skipping page {pageno}: {e}");
                continue;
            }
        };
        if codec == StreamCodec::None {
            dumpdict(out, reader, &page, codec)?;
        } else if let Some(contents) = page.get("Contents") {
            let resolved = reader.resolve(contents)?;
            dumpxml(out, reader, &resolved, codec)?;
        }
    }

    if objids.is_empty() && pagenos.is_empty() {
        dumptrailer(out, reader)?;
    }

    if codec != StreamCodec::Raw && codec != StreamCodec::Binary {
        writeln!(out)?;
    }
    Ok(())
}

/// A command line tool for dumping PDF internal structure as XML.
#[derive(Parser, Debug)]
#[command(name = "pdfdump")]
#[command(author, version, about = "Dump PDF file structure as XML", long_about = None)]
#[command(group(
    ArgGroup::new("procedure")
        .args(["outlines", "info", "select"])
))]
#[command(group(
    ArgGroup::new("stream_codec")
        .args(["raw_stream", "binary_stream", "text_stream"])
))]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Dump the outline (bookmarks)
    #[arg(short = 'T', long = "outlines", action = ArgAction::SetTrue)]
    outlines: bool,

    /// Print a summary of how the file was read
    #[arg(long, action = ArgAction::SetTrue)]
    info: bool,

    /// Keep only these pages (e.g. "1-3,5,7-") and write them to --output
    #[arg(long, requires = "output")]
    select: Option<String>,

    /// Destination of --select
    #[arg(long)]
    output: Option<PathBuf>,

    /// Comma-separated list of page numbers to dump (1-indexed)
    #[arg(short = 'p', long = "pagenos", value_delimiter = ',')]
    pagenos: Vec<usize>,

    /// Comma-separated list of object numbers to dump
    #[arg(short = 'i', long = "objects", value_delimiter = ',')]
    objects: Vec<u32>,

    /// Dump every object
    #[arg(short = 'a', long = "all", action = ArgAction::SetTrue)]
    all: bool,

    /// The password to use for decrypting the PDF file
    #[arg(short = 'P', long, default_value = "")]
    password: String,

    /// Load objects lazily and release them after use
    #[arg(long, action = ArgAction::SetTrue)]
    partial: bool,

    /// Read damaged objects as null instead of failing
    #[arg(long, action = ArgAction::SetTrue)]
    lenient: bool,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Write stream objects without decoding
    #[arg(short = 'r', long = "raw-stream", action = ArgAction::SetTrue)]
    raw_stream: bool,

    /// Write decoded stream objects as binary
    #[arg(short = 'b', long = "binary-stream", action = ArgAction::SetTrue)]
    binary_stream: bool,

    /// Write decoded stream objects as escaped text
    #[arg(short = 't', long = "text-stream", action = ArgAction::SetTrue)]
    text_stream: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.debug {
        simple_logger::SimpleLogger::new()
            .with_level(tracing::log::LevelFilter::Debug)
            .init()
            .context("installing logger")?;
    }

    let codec = if args.raw_stream {
        StreamCodec::Raw
    } else if args.binary_stream {
        StreamCodec::Binary
    } else if args.text_stream {
        StreamCodec::Text
    } else {
        StreamCodec::None
    };

    let options = ReaderOptions::new()
        .password(args.password.as_bytes())
        .partial(args.partial)
        .lenient(args.lenient);

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("creating {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    for path in &args.files {
        if !path.exists() {
            bail!("file not found: {}", path.display());
        }
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        // SAFETY: the map is read-only and the file is not modified while open.
        let mmap = unsafe { Mmap::map(&file) }?;
        let mut reader = PdfReader::open_mmap(mmap, options.clone())
            .with_context(|| format!("reading {}", path.display()))?;

        if let Some(ranges) = &args.select {
            let Some(target) = &args.output else {
                bail!("--select needs --output");
            };
            reader.select_pages_ranges(ranges)?;
            let bytes = reader.save(WriterOptions::default())?;
            std::fs::write(target, bytes)
                .with_context(|| format!("writing {}", target.display()))?;
        } else if args.outlines {
            dumpoutline(&mut output, &mut reader)?;
        } else if args.info {
            dumpinfo(&mut output, &mut reader)?;
        } else if args.all {
            dumpallobjs(&mut output, &mut reader, codec)?;
        } else {
            dumppdf(&mut output, &mut reader, &args.objects, &args.pagenos, codec)?;
        }
    }

    output.flush()?;
    Ok(())
}
