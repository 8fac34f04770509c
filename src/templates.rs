//! Sample host pages for the CLI demo mode and tests.
//!
//! Each page wraps its exportable content in a `.notice-detail-content`
//! panel surrounded by page chrome (header, navigation, footer) that must not
//! end up in the capture.

use std::str::FromStr;

/// A school notice with a heading, body paragraphs and a signature block.
pub fn notice_page() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head><title>Notices</title><style>.nav { color: red }</style></head>
<body>
  <div class="site-header" style="background: #1a365d; color: #ffffff; padding: 12px">
    <h1>Campus Portal</h1>
  </div>
  <div class="notice-detail-content" style="width: 720px; padding: 24px; background: #ffffff">
    <h1 style="text-align: center; color: #1a365d">Notice on the Winter Term Schedule</h1>
    <p style="text-align: center; color: #718096">Published 2025-11-20 by the Academic Affairs Office</p>
    <p>All departments: the winter term examinations will be held from 12 January to 23 January.
       Course instructors must submit their examination arrangements through the portal
       no later than 15 December.</p>
    <h2>Arrangements</h2>
    <ol>
      <li>Examination rooms are assigned by the registry and published one week in advance.</li>
      <li>Students must bring their campus card to every examination.</li>
      <li>Make-up examinations take place during the first week of the spring term.</li>
    </ol>
    <p>Questions may be directed to the Academic Affairs Office, extension 4021.</p>
    <p style="text-align: right">Academic Affairs Office</p>
  </div>
  <div class="site-footer" style="padding: 12px; color: #a0aec0">Copyright 2025</div>
</body>
</html>"##
}

/// An admissions page with a table of programmes and an embedded logo.
pub fn admission_page() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<body>
  <div class="nav">Home | Admissions | Contact</div>
  <div class="notice-detail-content" style="width: 720px; padding: 24px">
    <img src="data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAIAAAACCAIAAAD91JpzAAAAEElEQVR4nGPQCWoCIgYIBQAatgQBf3ngHQAAAABJRU5ErkJggg==" style="width: 48px; height: 48px">
    <h1 style="color: #2c5282">Undergraduate Admissions 2026</h1>
    <p>Applications for the 2026 intake open on 1 March and close on 30 June.
       Admission decisions are announced within four weeks of the closing date.</p>
    <table style="width: 100%">
      <tr>
        <th style="background: #e2e8f0; padding: 6px">Programme</th>
        <th style="background: #e2e8f0; padding: 6px">Places</th>
        <th style="background: #e2e8f0; padding: 6px">Duration</th>
      </tr>
      <tr><td style="padding: 6px">Computer Science</td><td style="padding: 6px">120</td><td style="padding: 6px">4 years</td></tr>
      <tr><td style="padding: 6px">Mechanical Engineering</td><td style="padding: 6px">90</td><td style="padding: 6px">4 years</td></tr>
      <tr><td style="padding: 6px">Economics</td><td style="padding: 6px">60</td><td style="padding: 6px">3 years</td></tr>
    </table>
    <h2>Requirements</h2>
    <ul>
      <li>Completed secondary education certificate</li>
      <li>Two letters of recommendation</li>
      <li>A personal statement of no more than 800 words</li>
    </ul>
  </div>
</body>
</html>"##
}

/// A notice long enough to span several A4 pages.
pub fn long_page(sections: usize) -> String {
    let mut body = String::new();
    for i in 1..=sections {
        body.push_str(&format!(
            "<h2>Section {i}</h2>\
             <p>Paragraph {i} describes one part of the regulations in enough detail \
             to wrap across several lines of the exported panel. Every section repeats \
             this text so that the panel grows well beyond a single printed page.</p>"
        ));
    }
    format!(
        r##"<html><body>
  <div class="notice-detail-content" style="width: 720px; padding: 24px">
    <h1>Student Handbook</h1>
    {body}
  </div>
</body></html>"##
    )
}

/// Bundled page selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    Notice,
    Admission,
    Long,
}

impl Demo {
    pub fn html(self) -> String {
        match self {
            Demo::Notice => notice_page().to_string(),
            Demo::Admission => admission_page().to_string(),
            Demo::Long => long_page(40),
        }
    }
}

impl FromStr for Demo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "notice" => Ok(Demo::Notice),
            "admission" => Ok(Demo::Admission),
            "long" => Ok(Demo::Long),
            other => Err(format!("unknown demo page '{other}' (expected notice, admission or long)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;
    use crate::presets::DETAIL_CONTENT_SELECTOR;

    #[test]
    fn every_demo_has_a_detail_panel() {
        for demo in [Demo::Notice, Demo::Admission, Demo::Long] {
            let page = Page::parse(&demo.html());
            assert!(
                page.query_selector(DETAIL_CONTENT_SELECTOR).is_some(),
                "{demo:?} is missing the detail panel"
            );
        }
    }

    #[test]
    fn chrome_is_outside_the_panel() {
        let page = Page::parse(notice_page());
        let panel = page.query_selector(DETAIL_CONTENT_SELECTOR).unwrap();
        assert!(!panel.text_content().contains("Campus Portal"));
        assert!(page.query_selector("body").unwrap().text_content().contains("Campus Portal"));
    }

    #[test]
    fn demo_names_parse() {
        assert_eq!("LONG".parse::<Demo>().unwrap(), Demo::Long);
        assert!("invoice".parse::<Demo>().is_err());
    }
}
