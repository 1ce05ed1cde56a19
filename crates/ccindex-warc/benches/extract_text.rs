use ccindex_warc::surt::surt;
use ccindex_warc::text::extract_text;

fn news_page(paragraphs: usize) -> Vec<u8> {
    let mut page = String::from(
        "<!DOCTYPE html><html><head><title>Evening edition</title>\
         <script>window.dataLayer = [];</script><style>p { margin: 0 }</style></head><body>",
    );
    for i in 0..paragraphs {
        page.push_str(&format!(
            "<p>Paragraph {i} of the story, with <a href=\"/link/{i}\">a link</a> and some &amp; entities.</p>"
        ));
    }
    page.push_str("</body></html>");
    page.into_bytes()
}

#[divan::bench(args = [10, 100, 1000])]
fn extract_html(bencher: divan::Bencher, paragraphs: usize) {
    let page = news_page(paragraphs);
    bencher.bench(|| extract_text(divan::black_box(&page)));
}

#[divan::bench]
fn extract_xml_feed(bencher: divan::Bencher) {
    let mut feed = String::from("<?xml version=\"1.0\"?><rss><channel>");
    for i in 0..200 {
        feed.push_str(&format!(
            "<item><title>Item {i}</title><description><![CDATA[Body {i}]]></description></item>"
        ));
    }
    feed.push_str("</channel></rss>");
    let feed = feed.into_bytes();
    bencher.bench(|| extract_text(divan::black_box(&feed)));
}

#[divan::bench]
fn surt_urls(bencher: divan::Bencher) {
    let urls = [
        "http://www.Example.com/News/2024/01/story.html?utm_source=rss&id=7",
        "https://sub.domain.example.co.uk:8443/a/b;jsessionid=ABC?b=2&a=1",
        "http://192.168.0.1/index.html",
    ];
    bencher.bench(|| {
        for url in &urls {
            divan::black_box(surt(url));
        }
    });
}

fn main() {
    divan::main();
}
