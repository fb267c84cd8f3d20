use super::*;

fn hydrated(html: &str, section_id: Option<&str>) -> Hydrated {
    Hydrated { class: None, id: None, html: html.into(), section_id: section_id.map(str::to_owned) }
}

#[test]
fn carries_section_id_over() {
    let mut h = hydrated("<p>hi</p>", Some("get-in-touch"));
    ContactHook::new(ContactOptions::default())
        .apply(&Attrs::new(), &mut h)
        .unwrap();
    assert_eq!(h.id.as_deref(), Some("get-in-touch"));
}

#[test]
fn falls_back_to_contact_id() {
    let mut h = hydrated("<p>hi</p>", None);
    ContactHook::new(ContactOptions::default())
        .apply(&Attrs::new(), &mut h)
        .unwrap();
    assert_eq!(h.id.as_deref(), Some("contact"));
}

#[test]
fn binds_form_to_endpoint() {
    let mut h = hydrated(r#"<form class="contact-form"><input name="email"></form>"#, None);
    let hook = ContactHook::new(ContactOptions { site_key: Some("site-key-1".into()), endpoint: "/api/submit".into() });

    hook.apply(&Attrs::new(), &mut h).unwrap();

    assert!(h.html.contains(
        r#"<form class="contact-form" action="/api/submit" method="post" data-recaptcha-site-key="site-key-1">"#
    ));
}

#[test]
fn other_forms_are_untouched() {
    let html = r#"<form class="newsletter"></form>"#;
    let mut h = hydrated(html, None);
    ContactHook::new(ContactOptions::default())
        .apply(&Attrs::new(), &mut h)
        .unwrap();
    assert_eq!(h.html, html);
}

#[test]
fn head_script_requires_site_key() {
    assert!(ContactHook::new(ContactOptions::default()).head_script().is_none());

    let script = ContactHook::new(ContactOptions { site_key: Some("abc".into()), ..ContactOptions::default() })
        .head_script()
        .unwrap();
    assert_eq!(script.marker, RECAPTCHA_SCRIPT_MARKER);
    assert_eq!(script.src, "https://www.google.com/recaptcha/api.js?render=abc");
    assert_eq!(
        script.tag(),
        r#"<script src="https://www.google.com/recaptcha/api.js?render=abc" async defer data-recaptcha-script="true"></script>"#
    );
}

#[test]
fn error_notice_matches_contact_styling() {
    let loader = loader(ContactOptions::default());
    assert_eq!(loader.notice.container_class, Some("py-20 px-4 sm:px-6 lg:px-8"));
    let rendered = loader.notice.render();
    assert!(rendered.contains("Contact Unavailable"));
    assert!(rendered.contains("We hit a hiccup loading the contact form."));
}
