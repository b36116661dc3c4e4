//! End-to-end scenarios over on-disk archives.

use serde_json::json;
use tempfile::TempDir;

use arriba_core::archive::{Archive, ArchiveWriter};
use arriba_core::document::{DocumentBuilder, Label, Tag};
use arriba_core::error::ErrorKind;
use arriba_core::selector::{Selector, TagSpec};
use arriba_core::span::Span;
use arriba_core::tagger::Signature;
use arriba_core::view::LabelType;

fn spacy() -> Signature {
    Signature::from_value(json!({"library": {"name": "spacy", "version": "3.2.1"}})).unwrap()
}

fn stanza() -> Signature {
    Signature::from_value(json!({"library": {"name": "stanza"}})).unwrap()
}

/// Archive where both taggers produce `pos` over the same text.
fn two_tagger_archive(dir: &TempDir) -> Archive {
    let path = dir.path().join("two.arriba");
    let mut writer = ArchiveWriter::create(&path).unwrap();
    let spacy_id = writer.add_tagger(&spacy());
    let stanza_id = writer.add_tagger(&stanza());
    let spacy_pos = writer.register_code(spacy_id, "pos").unwrap();
    let stanza_pos = writer.register_code(stanza_id, "pos").unwrap();

    let mut doc = DocumentBuilder::new("Go west");
    let go = doc.span(0, 2).unwrap();
    doc.add_tag(spacy_pos, Tag::spanned(go).with_label("VERB"));
    doc.add_tag(stanza_pos, Tag::spanned(go).with_label("VB"));
    writer.write_document(doc).unwrap();
    writer.finish().unwrap();
    Archive::open(&path).unwrap()
}

mod multi_tagger_clash {
    use super::*;

    #[test]
    fn default_view_fails_with_ambiguous_tags() {
        let dir = TempDir::new().unwrap();
        let archive = two_tagger_archive(&dir);
        let err = archive.default_view().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousTags);
    }

    #[test]
    fn renaming_view_exposes_both_taggers() {
        let dir = TempDir::new().unwrap();
        let archive = two_tagger_archive(&dir);
        let view = archive
            .view(&[
                TagSpec::new(Selector::new().with("library.name", "spacy"), "pos"),
                TagSpec::new(Selector::new().with("library.name", "stanza"), "pos")
                    .to("st_pos"),
            ])
            .unwrap();

        let doc = archive.document(0, &view).unwrap();
        let go = Span::new(0, 2);
        assert_eq!(doc.value(go, "pos").unwrap().as_str(), Some("VERB"));
        assert_eq!(doc.value(go, "st_pos").unwrap().as_str(), Some("VB"));
    }

    #[test]
    fn view_order_groups_tags_by_code() {
        let dir = TempDir::new().unwrap();
        let archive = two_tagger_archive(&dir);
        let view = archive
            .view(&[
                TagSpec::new(Selector::new().with("library.name", "stanza"), "pos")
                    .to("st_pos"),
                TagSpec::new(Selector::new().with("library.name", "spacy"), "pos"),
            ])
            .unwrap();
        let doc = archive.document(0, &view).unwrap();
        let all = doc.all_tags_in(doc.doc_span()).unwrap();
        let names: Vec<&str> = all.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["st_pos", "pos"]);
    }
}

mod selectors {
    use super::*;

    #[test]
    fn dotted_selector_picks_one_tagger() {
        let dir = TempDir::new().unwrap();
        let archive = two_tagger_archive(&dir);
        let spacy_id = archive
            .select(&Selector::new().with("library.name", "spacy"))
            .unwrap();
        assert_eq!(archive.taggers()[spacy_id.index()].codes.len(), 1);
    }

    #[test]
    fn empty_subtree_matches_both_and_is_ambiguous() {
        let dir = TempDir::new().unwrap();
        let archive = two_tagger_archive(&dir);
        let err = archive
            .select(&Selector::from_value(json!({"library": {}})).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
    }

    #[test]
    fn view_for_exposes_a_single_tagger() {
        let dir = TempDir::new().unwrap();
        let archive = two_tagger_archive(&dir);
        let view = archive
            .view_for(&Selector::new().with("library.name", "stanza"))
            .unwrap();
        let doc = archive.document(0, &view).unwrap();
        assert_eq!(
            doc.value(Span::new(0, 2), "pos").unwrap().as_str(),
            Some("VB")
        );
    }
}

mod label_types {
    use super::*;

    #[test]
    fn projections_follow_the_requested_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labels.arriba");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let tagger = writer.add_tagger(&spacy());
        let lang = writer.register_code(tagger, "lang").unwrap();
        let mut doc = DocumentBuilder::new("abc");
        let s = doc.span(0, 3).unwrap();
        doc.add_tag(
            lang,
            Tag::spanned(s)
                .with_scored_label("A", 0.9)
                .with_scored_label("B", 0.1),
        );
        writer.write_document(doc).unwrap();
        writer.finish().unwrap();
        let archive = Archive::open(&path).unwrap();

        for label_type in [LabelType::Str, LabelType::Strs, LabelType::Labels] {
            let view = archive
                .view(&[TagSpec::new(Selector::new(), "lang").with_label_type(label_type)])
                .unwrap();
            let doc = archive.document(0, &view).unwrap();
            let value = doc.tags("lang").unwrap()[0].value().unwrap();
            match label_type {
                LabelType::Str => assert_eq!(value.as_str(), Some("A|B")),
                LabelType::Strs => assert_eq!(
                    value.as_strs().unwrap(),
                    &["A".to_string(), "B".to_string()]
                ),
                LabelType::Labels => assert_eq!(
                    value.as_labels().unwrap(),
                    &[Label::scored("A", 0.9), Label::scored("B", 0.1)]
                ),
            }
        }
    }
}

mod width_adaptation {
    use super::*;

    #[test]
    fn column_widths_are_chosen_per_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("widths.arriba");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let tagger = writer.add_tagger(&spacy());
        let token = writer.register_code(tagger, "token").unwrap();

        // 100-byte document: offsets fit in bytes.
        let mut small = DocumentBuilder::new("x".repeat(100));
        for i in 0..40 {
            let s = small.span(i * 2, i * 2 + 1).unwrap();
            small.add_tag(token, Tag::spanned(s).with_label(format!("t{i}")));
        }
        writer.write_document(small).unwrap();

        // 70,000-byte document: starts need 32 bits, in its record only.
        let mut large = DocumentBuilder::new("y".repeat(70_000));
        let s = large.span(69_990, 70_000).unwrap();
        large.add_tag(token, Tag::spanned(s).with_label("t"));
        writer.write_document(large).unwrap();
        writer.finish().unwrap();

        let archive = Archive::open(&path).unwrap();
        let small = archive.record(0).unwrap();
        assert_eq!(small.starts.width(), Some(8));
        assert_eq!(small.lens.width(), Some(8));
        assert_eq!(small.tags[0].labels.values.width(), Some(8));

        let large = archive.record(1).unwrap();
        assert_eq!(large.starts.width(), Some(32));
        assert_eq!(large.lens.width(), Some(8));
    }
}

mod round_trip {
    use super::*;

    #[test]
    fn tag_tuples_survive_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rt.arriba");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let tagger = writer.add_tagger(&spacy());
        let dep = writer.register_code(tagger, "dep").unwrap();
        let note = writer.register_code(tagger, "note").unwrap();

        let mut doc = DocumentBuilder::new("ab cd");
        let ab = doc.span(0, 2).unwrap();
        let cd = doc.span(3, 5).unwrap();
        doc.add_tag(dep, Tag::spanned(ab).with_label("root").with_vector(vec![1.0, 2.5]));
        doc.add_tag(
            dep,
            Tag::spanned(cd)
                .with_scored_label("obj", 0.75)
                .with_scored_label("nsubj", 0.25)
                .with_parent(0),
        );
        doc.add_tag(note, Tag::new().with_label("document-level"));
        writer.write_document(doc).unwrap();
        writer.finish().unwrap();

        let archive = Archive::open(&path).unwrap();
        let view = archive.default_view().unwrap();
        let doc = archive.document(0, &view).unwrap();

        let deps = doc.tags("dep").unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].span().unwrap(), Some(Span::new(0, 2)));
        assert_eq!(deps[0].labels().unwrap(), vec![Label::new("root")]);
        assert_eq!(deps[0].vector(), Some(vec![1.0, 2.5]));
        assert!(deps[0].parent().unwrap().is_none());

        assert_eq!(deps[1].span().unwrap(), Some(Span::new(3, 5)));
        assert_eq!(
            deps[1].labels().unwrap(),
            vec![Label::scored("obj", 0.75), Label::scored("nsubj", 0.25)]
        );
        assert_eq!(deps[1].vector(), None);
        let parent = deps[1].parent().unwrap().unwrap();
        assert_eq!(parent.index(), 0);
        assert_eq!(parent.text().unwrap(), "ab");

        let notes = doc.tags("note").unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].span().unwrap(), None);
        assert_eq!(notes[0].text().unwrap(), "ab cd");
    }
}

mod concurrency {
    use super::*;

    #[test]
    fn many_threads_share_one_archive_handle() {
        let dir = TempDir::new().unwrap();
        let archive = two_tagger_archive(&dir);
        let view = archive
            .view(&[
                TagSpec::new(Selector::new().with("library.name", "spacy"), "pos"),
                TagSpec::new(Selector::new().with("library.name", "stanza"), "pos")
                    .to("st_pos"),
            ])
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for doc in archive.iter(&view) {
                        let doc = doc.unwrap();
                        assert_eq!(
                            doc.value(Span::new(0, 2), "pos").unwrap().as_str(),
                            Some("VERB")
                        );
                    }
                });
            }
        });
    }
}

mod corrupt_documents {
    use super::*;

    /// Build a two-document archive and smash the tail of the second
    /// record. The header sits before the document region, so only the
    /// second document is affected.
    fn archive_with_corrupt_tail(dir: &TempDir) -> Archive {
        let path = dir.path().join("corrupt.arriba");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let tagger = writer.add_tagger(&spacy());
        let token = writer.register_code(tagger, "token").unwrap();

        let mut first = DocumentBuilder::new("intact document");
        let s = first.span(0, 6).unwrap();
        first.add_tag(token, Tag::spanned(s).with_label("ok"));
        writer.write_document(first).unwrap();

        let mut second = DocumentBuilder::new("x".repeat(200));
        for i in 0..20 {
            let s = second.span(i * 10, i * 10 + 5).unwrap();
            second.add_tag(token, Tag::spanned(s).with_label(format!("t{i}")));
        }
        writer.write_document(second).unwrap();
        writer.finish().unwrap();

        // 0xC1 is never valid MessagePack; the second record ends the file.
        let mut bytes = std::fs::read(&path).unwrap();
        let len = bytes.len();
        bytes[len - 40..].fill(0xC1);
        std::fs::write(&path, &bytes).unwrap();
        Archive::open(&path).unwrap()
    }

    #[test]
    fn strict_iteration_surfaces_the_error() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with_corrupt_tail(&dir);
        let view = archive.default_view().unwrap();
        let results: Vec<_> = archive.iter(&view).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1].as_ref().unwrap_err().kind(),
            ErrorKind::CorruptArchive
        );
    }

    #[test]
    fn lenient_iteration_skips_and_keeps_siblings() {
        let dir = TempDir::new().unwrap();
        let archive = archive_with_corrupt_tail(&dir);
        let view = archive.default_view().unwrap();
        let docs: Vec<_> = archive
            .iter(&view)
            .lenient()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text(), "intact document");
    }
}
