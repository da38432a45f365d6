use clap::{arg, value_parser};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("lurker")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("lurker")
        .about("Crawl every URL piped on stdin and print the links found")
        .after_help("Example: cat urls.txt | lurker -d 3 -u --json")
        .styles(CLAP_STYLING)
        .arg(arg!(-i --"inside" "Only crawl inside path"))
        .arg(
            arg!(-t --"threads" <N>)
                .help("Number of concurrent workers per seed")
                .value_parser(value_parser!(usize))
                .default_value("8"),
        )
        .arg(
            arg!(-d --"depth" <N>)
                .help("Depth to crawl, 0 for unlimited")
                .value_parser(value_parser!(usize))
                .default_value("2"),
        )
        .arg(
            arg!(--"size" <KB>)
                .help("Page size limit, in KB")
                .value_parser(value_parser!(usize)),
        )
        .arg(arg!(--"insecure" "Disable TLS verification"))
        .arg(arg!(--"subs" "Include subdomains for crawling"))
        .arg(arg!(--"json" "Output as JSON"))
        .arg(arg!(
            -s --"show-source" "Show where a URL was found, e.g. href, form, script"
        ))
        .arg(arg!(-w --"show-where" "Show the page each URL was found on"))
        .arg(arg!(-u --"unique" "Show only unique URLs"))
        .arg(
            arg!(--"proxy" <URL>)
                .help("Proxy URL, e.g. http://127.0.0.1:8080")
                .env("PROXY"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .help("Maximum time to crawl each URL from stdin, in seconds")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"disable-redirects" "Disable following HTTP redirects")
                .visible_alias("dr"),
        )
        .arg(
            arg!(-k --"keywords" <PATH>)
                .help("Only report URLs containing one of the keywords in this file"),
        )
        .arg(
            arg!(-H --"headers" <HEADERS>)
                .help("Custom headers separated by two semicolons, e.g. \"Cookie: a=1;;Host: b\""),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .help("File that matched URLs are appended to")
                .default_value("matched_urls.txt"),
        )
}
