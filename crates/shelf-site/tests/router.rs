use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use shelf_site::{DirHandler, DynamicHandler, FilesHandler, Producer, Site, StaticContent};
use tempfile::TempDir;

/// Build a router resembling a real site: assets, covers, one book.
fn site_with_book(tmp: &TempDir) -> (Site, Arc<Mutex<Vec<String>>>) {
    let assets = tmp.path().join("static");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("main.css"), "body{}").unwrap();

    let images = tmp.path().join("img");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(images.join("a.png"), b"png").unwrap();

    let site = Site::new();
    site.push(Arc::new(DirHandler::new(assets, "/s/")));
    site.push(Arc::new(
        StaticContent::new().with("/index.html", b"<h1>books</h1>".to_vec()),
    ));

    let files = FilesHandler::new();
    files.add_file("/go/img/a.png", images.join("a.png"));
    site.push(Arc::new(files));

    let pages: Arc<Mutex<Vec<String>>> = Arc::default();
    let resolve_pages = Arc::clone(&pages);
    let list_pages = Arc::clone(&pages);
    site.push(Arc::new(DynamicHandler::new(
        move |uri| {
            let pages = resolve_pages.lock().unwrap();
            pages
                .iter()
                .any(|p| p == uri)
                .then(|| Producer::from_bytes("text/html", format!("page {uri}").into_bytes()))
        },
        move || list_pages.lock().unwrap().clone(),
    )));

    (site, pages)
}

#[test]
fn test_handler_uri_sets_are_disjoint() {
    let tmp = TempDir::new().unwrap();
    let (site, pages) = site_with_book(&tmp);
    pages
        .lock()
        .unwrap()
        .extend(["/go/index.html".to_owned(), "/go/intro-a1.html".to_owned()]);

    let mut seen = HashSet::new();
    for uris in site.uris_by_handler() {
        for uri in uris {
            assert!(seen.insert(uri.clone()), "{uri} owned by two handlers");
        }
    }
    assert_eq!(seen.len(), site.all_uris().len());
}

#[test]
fn test_every_listed_uri_resolves_idempotently() {
    let tmp = TempDir::new().unwrap();
    let (site, pages) = site_with_book(&tmp);
    pages.lock().unwrap().push("/go/index.html".to_owned());

    let mut uris = site.all_uris();
    uris.sort();
    assert_eq!(
        uris,
        vec!["/go/img/a.png", "/go/index.html", "/index.html", "/s/main.css"]
    );

    for uri in uris {
        let first = site.resolve(&uri).unwrap().to_bytes().unwrap();
        let second = site.resolve(&uri).unwrap().to_bytes().unwrap();
        assert_eq!(first, second, "{uri} is not idempotent");
    }
}

#[test]
fn test_book_pages_appear_as_build_progresses() {
    let tmp = TempDir::new().unwrap();
    let (site, pages) = site_with_book(&tmp);

    assert!(site.resolve("/go/index.html").is_none());
    pages.lock().unwrap().push("/go/index.html".to_owned());
    assert!(site.resolve("/go/index.html").is_some());
}
