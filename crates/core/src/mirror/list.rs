use quick_xml::events::Event;
use quick_xml::Reader;

use super::MirrorListError;

const ROOT_TAG: &[u8] = b"Mediathek";
const SERVER_TAG: &[u8] = b"Server";
const URL_TAG: &[u8] = b"URL";

/// Parse a mirror list document.
///
/// The document root must be `Mediathek`. Every `Server` child contributes
/// the text of its first `URL` element. Blank URLs are skipped, and a
/// document without any usable URL is rejected.
pub fn parse_mirror_list(document: &[u8]) -> Result<Vec<String>, MirrorListError> {
    let mut reader = Reader::from_reader(document);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;
    let mut server_url: Option<String> = None;
    let mut mirrors = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| MirrorListError::Malformed(e.to_string()))?;

        match event {
            Event::Start(element) => {
                let name = element.name().as_ref().to_vec();
                if path.is_empty() {
                    check_root(&name, &mut seen_root)?;
                } else if path.len() == 1 && name == SERVER_TAG {
                    server_url = None;
                }
                path.push(name);
            }
            Event::Empty(element) => {
                if path.is_empty() {
                    check_root(element.name().as_ref(), &mut seen_root)?;
                }
            }
            Event::End(_) => {
                if let Some(name) = path.pop() {
                    if path.len() == 1 && name == SERVER_TAG {
                        if let Some(url) = server_url.take() {
                            mirrors.push(url);
                        }
                    }
                }
            }
            Event::Text(text) if in_server_url(&path) => {
                let text = text
                    .unescape()
                    .map_err(|e| MirrorListError::Malformed(e.to_string()))?;
                record_url(&mut server_url, &text);
            }
            Event::CData(data) if in_server_url(&path) => {
                let text = String::from_utf8_lossy(&data);
                record_url(&mut server_url, &text);
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    if !seen_root {
        return Err(MirrorListError::Malformed("missing root element".to_string()));
    }

    if mirrors.is_empty() {
        return Err(MirrorListError::Empty);
    }

    Ok(mirrors)
}

fn check_root(name: &[u8], seen_root: &mut bool) -> Result<(), MirrorListError> {
    if *seen_root {
        return Err(MirrorListError::Malformed(
            "multiple root elements".to_string(),
        ));
    }
    if name != ROOT_TAG {
        return Err(MirrorListError::Malformed(format!(
            "unexpected root element '{}'",
            String::from_utf8_lossy(name)
        )));
    }
    *seen_root = true;
    Ok(())
}

fn in_server_url(path: &[Vec<u8>]) -> bool {
    path.len() == 3 && path[1] == SERVER_TAG && path[2] == URL_TAG
}

fn record_url(server_url: &mut Option<String>, text: &str) {
    let url = text.trim();
    if server_url.is_none() && !url.is_empty() {
        *server_url = Some(url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_servers() {
        let document = b"<Mediathek><Server><URL>http://a</URL></Server><Server><URL>http://b</URL></Server></Mediathek>";
        assert_eq!(
            parse_mirror_list(document).unwrap(),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }

    #[test]
    fn test_parse_with_declaration_and_extra_elements() {
        let document = br#"<?xml version="1.0" encoding="UTF-8"?>
<Mediathek>
  <Server>
    <URL>
      http://m1.example/Filmliste-akt.xz
    </URL>
    <Prio>1</Prio>
  </Server>
  <Info>ignored</Info>
  <Server>
    <URL><![CDATA[http://m2.example/Filmliste-akt.xz]]></URL>
  </Server>
</Mediathek>"#;

        assert_eq!(
            parse_mirror_list(document).unwrap(),
            vec![
                "http://m1.example/Filmliste-akt.xz".to_string(),
                "http://m2.example/Filmliste-akt.xz".to_string(),
            ]
        );
    }

    #[test]
    fn test_wrong_root_is_malformed() {
        let err = parse_mirror_list(b"<Foo/>").unwrap_err();
        assert!(matches!(err, MirrorListError::Malformed(_)));

        let err = parse_mirror_list(b"<Foo><Server><URL>http://a</URL></Server></Foo>").unwrap_err();
        assert!(matches!(err, MirrorListError::Malformed(_)));
    }

    #[test]
    fn test_missing_root_is_malformed() {
        let err = parse_mirror_list(b"").unwrap_err();
        assert!(matches!(err, MirrorListError::Malformed(_)));
    }

    #[test]
    fn test_broken_xml_is_malformed() {
        let err = parse_mirror_list(b"<Mediathek><Server></URL></Mediathek>").unwrap_err();
        assert!(matches!(err, MirrorListError::Malformed(_)));
    }

    #[test]
    fn test_no_urls_is_empty() {
        assert_eq!(
            parse_mirror_list(b"<Mediathek/>").unwrap_err(),
            MirrorListError::Empty
        );
        assert_eq!(
            parse_mirror_list(b"<Mediathek><Server><URL>  </URL></Server></Mediathek>")
                .unwrap_err(),
            MirrorListError::Empty
        );
    }

    #[test]
    fn test_nested_url_outside_server_is_ignored() {
        let document = b"<Mediathek><URL>http://stray</URL><Server><URL>http://a</URL></Server></Mediathek>";
        assert_eq!(parse_mirror_list(document).unwrap(), vec!["http://a".to_string()]);
    }
}
