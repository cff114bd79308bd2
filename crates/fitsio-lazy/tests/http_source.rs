//! Remote access against a local HTTP server that honours Range requests.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use fitsio_lazy::{
    Array, ByteRangeSource, Error, FitsWriter, HttpSource, IndexExpr, OpenOptions, PARTIALLY_READ,
};

#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    range: Option<(u64, u64)>,
}

type Requests = Arc<Mutex<Vec<Request>>>;

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn handle(mut stream: TcpStream, body: &[u8], requests: &Requests) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut range = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 || header.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("range") {
                range = parse_range(value);
            }
        }
    }
    requests.lock().unwrap().push(Request {
        method: method.clone(),
        path,
        range,
    });

    let total = body.len() as u64;
    let (status, content, extra) = match range {
        Some((start, end)) if start < total => {
            let end = end.min(total - 1);
            (
                "206 Partial Content",
                &body[start as usize..=end as usize],
                format!("Content-Range: bytes {start}-{end}/{total}\r\n"),
            )
        }
        Some(_) => ("416 Range Not Satisfiable", &body[..0], String::new()),
        None => ("200 OK", body, String::new()),
    };
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n{extra}Connection: close\r\n\r\n",
        content.len()
    )?;
    if method != "HEAD" {
        stream.write_all(content)?;
    }
    stream.flush()
}

/// Serves `body` for every path until the test process exits.
fn serve(body: Vec<u8>) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests = Requests::default();
    let log = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let _ = handle(stream, &body, &log);
        }
    });
    (base, requests)
}

fn sci() -> Array {
    Array::from_vec(
        vec![30, 50],
        (0..1500).map(|v| (v as f32).sqrt() * 1e-3 - 0.01).collect(),
    )
    .unwrap()
}

fn container() -> Vec<u8> {
    let mut w = FitsWriter::new();
    w.empty_primary()
        .unwrap()
        .image_extension(&sci(), Some("SCI"))
        .unwrap()
        .image_extension(&sci(), Some("WHT"))
        .unwrap();
    w.finish()
}

#[test]
fn http_source_reads_ranges() {
    let body = container();
    let (base, requests) = serve(body.clone());
    let mut source = HttpSource::new(format!("{base}/test0.fits")).unwrap();
    assert_eq!(source.len().unwrap(), body.len() as u64);
    assert_eq!(source.read(2880, 80).unwrap(), &body[2880..2960]);
    assert_eq!(source.read(0, 0).unwrap(), Vec::<u8>::new());

    let log = requests.lock().unwrap();
    let ranged: Vec<_> = log.iter().filter_map(|r| r.range).collect();
    assert_eq!(ranged, vec![(2880, 2959)]);
}

#[test]
fn http_source_reports_short_objects() {
    let (base, _requests) = serve(vec![0; 100]);
    let mut source = HttpSource::new(format!("{base}/tiny.fits")).unwrap();
    assert!(source.read(90, 20).is_err());
}

#[test]
fn lazy_window_over_http() {
    let (base, requests) = serve(container());
    let list = OpenOptions::new()
        .lazy(true)
        .cache_block_size(2880)
        .open(&format!("{base}/test0.fits"))
        .unwrap();
    assert!(list.is_partially_read());

    let window = list
        .hdu(1)
        .unwrap()
        .section()
        .unwrap()
        .get(&IndexExpr::window(&[(10, 12), (20, 23)]))
        .unwrap();
    let expected = sci().slice(&"10:12, 20:23".parse().unwrap()).unwrap();
    assert_eq!(window.shape(), &[2, 3]);
    assert!(window.all_close(&expected, 1e-7));

    assert!(format!("{list:?}").contains(PARTIALLY_READ));
    assert!(list.to_string().contains(PARTIALLY_READ));

    // Headers plus one cached block for the window; never the whole object.
    let log = requests.lock().unwrap();
    assert!(log.iter().all(|r| r.method == "HEAD" || r.range.is_some()));
    let fetched: u64 = log.iter().filter_map(|r| r.range).map(|(a, b)| b - a + 1).sum();
    assert!(fetched < container().len() as u64);
}

#[test]
fn s3_uri_with_custom_endpoint() {
    let (base, requests) = serve(container());
    let list = OpenOptions::new()
        .s3_endpoint(base)
        .open("s3://stpubdata/hst/public/test0.fits")
        .unwrap();
    assert!(list.is_lazy());
    let row = list.by_name("WHT").unwrap().subset().unwrap().get(&"-1".parse().unwrap()).unwrap();
    assert_eq!(row.shape(), &[50]);
    assert!(list.to_string().contains(PARTIALLY_READ));
    assert!(requests
        .lock()
        .unwrap()
        .iter()
        .all(|r| r.path == "/stpubdata/hst/public/test0.fits"));
}

#[test]
fn missing_object_is_an_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            let mut line = String::new();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            while reader.read_line(&mut line).map_or(false, |n| n > 2) {
                line.clear();
            }
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        }
    });
    let result = OpenOptions::new().lazy(true).open(&format!("{base}/none.fits"));
    assert!(matches!(result, Err(Error::HttpStatus { status: 404, .. })));
}
