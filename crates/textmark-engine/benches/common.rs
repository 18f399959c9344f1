// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_article(paragraphs: usize) -> String {
    let mut content = String::from("<html><body>\n<h1>Title</h1>\n");
    for i in 0..paragraphs {
        content.push_str(&format!(
            "<p>Paragraph {i} with <em>some</em> content and a formula <math><mi>x</mi><mo>=</mo><mn>{i}</mn></math> inline.</p>\n"
        ));
        if i % 10 == 0 {
            content.push_str("<table><tr><td>cell</td><td>value</td></tr></table>\n");
        }
    }
    content.push_str("</body></html>\n");
    content
}

/// Path of the `n`-th paragraph (1-based).
#[allow(dead_code)]
pub fn paragraph_path(n: usize) -> String {
    if n == 1 {
        "/html/body/p".to_string()
    } else {
        format!("/html/body/p[{n}]")
    }
}
