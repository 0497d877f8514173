//! Reading and writing the `<familyTree>` document.
//!
//! Loading runs three passes: people, then marriages, then parent/child
//! links, because the later passes resolve ids created by the earlier ones.
//! References to ids that are not in the document are dropped without error.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use log::{debug, info};
use roxmltree::{Document, Node};
use tempfile::NamedTempFile;

use crate::error::{LoadError, SaveError};
use crate::graph::{FamilyGraph, couple_key};
use crate::model::{MarriageDetails, Person, PersonId, format_iso_date, parse_optional_date};

const INDENT: &str = "    ";

pub fn load_family_tree(path: &Path) -> Result<FamilyGraph, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let graph = parse_family_tree(&text)?;
    info!(
        path:? = path,
        people = graph.len(),
        couples = graph.couple_count();
        "Family tree loaded"
    );
    Ok(graph)
}

pub fn parse_family_tree(text: &str) -> Result<FamilyGraph, LoadError> {
    let doc = Document::parse(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != "familyTree" {
        return Err(LoadError::UnexpectedRoot(root.tag_name().name().to_string()));
    }

    let person_elements = wrapped_elements(root, "persons", "person");
    let marriage_elements = wrapped_elements(root, "marriages", "marriage");
    let mut graph = FamilyGraph::new();

    for el in &person_elements {
        let id = required_attr(el, "person", "id")?;
        let name = el.attribute("name").unwrap_or_default();
        let birth = parse_optional_date(el.attribute("birthDate"))?;
        let death = parse_optional_date(el.attribute("deathDate"))?;
        graph.add_person(Person::new(id, name).with_lifespan(birth, death)?)?;
    }

    let mut ranks: HashMap<&str, Vec<usize>> = HashMap::new();
    for el in &marriage_elements {
        let spouse1 = el.attribute("spouse1").unwrap_or_default();
        let spouse2 = el.attribute("spouse2").unwrap_or_default();
        let details = MarriageDetails {
            start_date: parse_optional_date(el.attribute("startDate"))?,
            start_area: text_attr(el, "startArea"),
            start_country: text_attr(el, "startCountry"),
            end_date: parse_optional_date(el.attribute("endDate"))?,
            end_area: text_attr(el, "endArea"),
            end_country: text_attr(el, "endCountry"),
        };
        if !graph.contains(spouse1) || !graph.contains(spouse2) {
            debug!(spouse1, spouse2; "Dropping marriage with unknown spouse");
            continue;
        }
        if graph.add_marriage(spouse1, spouse2, details) {
            ranks.entry(spouse1).or_default().push(order_attr(el, "spouse1Order"));
            ranks.entry(spouse2).or_default().push(order_attr(el, "spouse2Order"));
        }
    }
    // Records without a stored position keep document order, after the rest.
    for (id, rank) in &ranks {
        graph.rank_marriages(id, rank);
    }

    // Declared parent slots first so their order survives a round trip.
    for el in &person_elements {
        let id = required_attr(el, "person", "id")?;
        for slot in ["parent1", "parent2"] {
            let Some(parent) = el.attribute(slot).filter(|v| !v.is_empty()) else {
                continue;
            };
            if !graph.assign_parent_slot(id, parent) {
                debug!(person = id, parent; "Dropping unresolved or invalid parent reference");
            }
        }
    }

    for el in &person_elements {
        let id = required_attr(el, "person", "id")?;
        for child_el in el.children().filter(|n| n.has_tag_name("child")) {
            let child = child_el.attribute("id").unwrap_or_default();
            if !graph.add_child(id, child) {
                debug!(person = id, child; "Dropping unresolved or invalid child reference");
            }
        }
    }

    // Complete links that were only declared from the child's side.
    let declared: Vec<(PersonId, PersonId)> = graph
        .people()
        .flat_map(|p| {
            graph
                .parents(p.id().as_str())
                .into_iter()
                .map(move |parent| (parent, p.id().clone()))
        })
        .collect();
    for (parent, child) in declared {
        graph.add_child(parent.as_str(), child.as_str());
    }

    Ok(graph)
}

/// Serializes the graph, people in graph order. Each couple's mirrored
/// records produce a single `<marriage>`; a couple that married more than
/// once gets one element per marriage. `spouse1Order`/`spouse2Order` keep
/// each spouse's own marriage order.
pub fn write_family_tree(graph: &FamilyGraph) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
    out.push_str("<familyTree>\n");
    let mut marriages = String::new();
    let mut seen: HashSet<((&str, &str), usize)> = HashSet::new();

    let _ = writeln!(out, "{INDENT}<persons>");
    for person in graph.people() {
        let mut attrs = vec![
            ("id", person.id().to_string()),
            ("name", person.display_name().to_string()),
        ];
        if let Some(date) = person.birth_date() {
            attrs.push(("birthDate", format_iso_date(date)));
        }
        if let Some(date) = person.death_date() {
            attrs.push(("deathDate", format_iso_date(date)));
        }
        if let Some(parent) = person.parent1() {
            attrs.push(("parent1", parent.to_string()));
        }
        if let Some(parent) = person.parent2() {
            attrs.push(("parent2", parent.to_string()));
        }

        let mut children: Vec<&PersonId> = Vec::new();
        for child in person.descendants() {
            if !children.contains(&child) {
                children.push(child);
            }
        }

        let open = element_open("person", &attrs);
        if children.is_empty() {
            let _ = writeln!(out, "{INDENT}{INDENT}{open}/>");
        } else {
            let _ = writeln!(out, "{INDENT}{INDENT}{open}>");
            for child in children {
                let child_el = element_open("child", &[("id", child.to_string())]);
                let _ = writeln!(out, "{INDENT}{INDENT}{INDENT}{child_el}/>");
            }
            let _ = writeln!(out, "{INDENT}{INDENT}</person>");
        }

        let mut ordinals: HashMap<&str, usize> = HashMap::new();
        for (position, marriage) in person.marriages().iter().enumerate() {
            let spouse = marriage.spouse().as_str();
            let counter = ordinals.entry(spouse).or_default();
            let ordinal = *counter;
            *counter += 1;
            if !seen.insert((couple_key(person.id().as_str(), spouse), ordinal)) {
                continue;
            }
            let details = marriage.details();
            let mut attrs = vec![
                ("spouse1", person.id().to_string()),
                ("spouse2", spouse.to_string()),
                ("spouse1Order", position.to_string()),
            ];
            if let Some(index) = mirrored_position(graph, spouse, person.id(), ordinal) {
                attrs.push(("spouse2Order", index.to_string()));
            }
            if let Some(date) = details.start_date {
                attrs.push(("startDate", format_iso_date(date)));
            }
            push_text(&mut attrs, "startArea", &details.start_area);
            push_text(&mut attrs, "startCountry", &details.start_country);
            if let Some(date) = details.end_date {
                attrs.push(("endDate", format_iso_date(date)));
            }
            push_text(&mut attrs, "endArea", &details.end_area);
            push_text(&mut attrs, "endCountry", &details.end_country);
            let open = element_open("marriage", &attrs);
            let _ = writeln!(marriages, "{INDENT}{INDENT}{open}/>");
        }
    }
    let _ = writeln!(out, "{INDENT}</persons>");

    let _ = writeln!(out, "{INDENT}<marriages>");
    out.push_str(&marriages);
    let _ = writeln!(out, "{INDENT}</marriages>");
    out.push_str("</familyTree>\n");
    out
}

/// Writes the document through a temporary file in the target directory and
/// moves it into place, so a failed save leaves the old file intact.
pub fn save_family_tree(graph: &FamilyGraph, path: &Path) -> Result<(), SaveError> {
    let text = write_family_tree(graph);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(text.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    info!(path:? = path, people = graph.len(); "Family tree saved");
    Ok(())
}

/// Index in `owner`'s list of the `ordinal`-th record pointing at `spouse`.
fn mirrored_position(graph: &FamilyGraph, owner: &str, spouse: &PersonId, ordinal: usize) -> Option<usize> {
    graph
        .person(owner)?
        .marriages()
        .iter()
        .enumerate()
        .filter(|(_, m)| m.spouse() == spouse)
        .nth(ordinal)
        .map(|(index, _)| index)
}

fn wrapped_elements<'a, 'input>(
    root: Node<'a, 'input>,
    wrapper: &str,
    tag: &str,
) -> Vec<Node<'a, 'input>> {
    root.children()
        .filter(|n| n.has_tag_name(wrapper))
        .flat_map(|w| w.children())
        .filter(|n| n.has_tag_name(tag))
        .collect()
}

fn required_attr<'a>(
    el: &Node<'a, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, LoadError> {
    el.attribute(attribute)
        .filter(|v| !v.trim().is_empty())
        .ok_or(LoadError::MissingAttribute { element, attribute })
}

fn text_attr(el: &Node<'_, '_>, name: &str) -> Option<String> {
    el.attribute(name)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn order_attr(el: &Node<'_, '_>, name: &str) -> usize {
    el.attribute(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(usize::MAX)
}

fn push_text(attrs: &mut Vec<(&'static str, String)>, name: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        attrs.push((name, value.clone()));
    }
}

fn element_open(tag: &str, attrs: &[(&str, String)]) -> String {
    let mut out = format!("<{tag}");
    for (name, value) in attrs {
        let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
    }
    out
}

/// Like [`escape_xml`], plus the whitespace that attribute-value
/// normalization would otherwise turn into spaces.
fn escape_attr(input: &str) -> String {
    escape_xml(input)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::model::parse_date;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<familyTree>
    <persons>
        <person id="1" name="John" birthDate="1970-03-01" parent1="6" parent2="7"/>
        <person id="2" name="Jane &amp; Co" birthDate="1972-04-02">
            <child id="3"/>
            <child id="4"/>
            <child id="99"/>
        </person>
        <person id="3" name="Ann" birthDate="2003-01-01" parent1="1" parent2="2"/>
        <person id="4" name="Ben" birthDate="2001-01-01" parent1="1" parent2="2"/>
        <person id="6" name="Old John"/>
        <person id="7" name="Old Mary" deathDate=""/>
    </persons>
    <marriages>
        <marriage spouse1="1" spouse2="2" startDate="2000-06-20" startArea="Leeds" startCountry="UK" endDate="2010-06-20"/>
        <marriage spouse1="1" spouse2="42" startDate="1999-01-01"/>
    </marriages>
</familyTree>
"#;

    #[test]
    fn load_builds_bidirectional_links() {
        let graph = parse_family_tree(SAMPLE).unwrap();
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.person("2").unwrap().display_name(), "Jane & Co");

        let john = graph.person("1").unwrap();
        assert_eq!(john.parent1().map(PersonId::as_str), Some("6"));
        assert_eq!(john.parent2().map(PersonId::as_str), Some("7"));
        assert_eq!(graph.person("6").unwrap().descendants(), &[PersonId::from("1")]);

        let ann = graph.person("3").unwrap();
        assert_eq!(ann.parent1().map(PersonId::as_str), Some("1"));
        assert_eq!(ann.parent2().map(PersonId::as_str), Some("2"));
        let jane_children: Vec<&str> = graph
            .person("2")
            .unwrap()
            .descendants()
            .iter()
            .map(PersonId::as_str)
            .collect();
        assert_eq!(jane_children, vec!["3", "4"]);
        assert_eq!(graph.shared_descendants("1", "2").len(), 2);
    }

    #[test]
    fn load_drops_dangling_marriages_and_children() {
        let graph = parse_family_tree(SAMPLE).unwrap();
        assert_eq!(graph.person("1").unwrap().marriages().len(), 1);
        assert_eq!(graph.couple_count(), 1);
        let marriage = graph.marriage_with("2", "1").unwrap();
        assert_eq!(marriage.details().start_area.as_deref(), Some("Leeds"));
        assert_eq!(marriage.details().end_date, Some(parse_date("2010-06-20").unwrap()));
        assert_eq!(marriage.details().end_area, None);
    }

    #[test]
    fn load_rejects_bad_dates_and_documents() {
        let bad_date = r#"<familyTree><persons><person id="1" name="A" birthDate="01/02/1990"/></persons></familyTree>"#;
        assert!(matches!(parse_family_tree(bad_date), Err(LoadError::Date(_))));

        assert!(matches!(parse_family_tree("<familyTree>"), Err(LoadError::Xml(_))));
        assert!(matches!(
            parse_family_tree("<tree/>"),
            Err(LoadError::UnexpectedRoot(tag)) if tag == "tree"
        ));
        assert!(matches!(
            parse_family_tree(r#"<familyTree><persons><person name="A"/></persons></familyTree>"#),
            Err(LoadError::MissingAttribute { element: "person", attribute: "id" })
        ));
        let duplicate = r#"<familyTree><persons><person id="1"/><person id="1"/></persons></familyTree>"#;
        assert!(matches!(
            parse_family_tree(duplicate),
            Err(LoadError::Graph(GraphError::DuplicateId(_)))
        ));
    }

    #[test]
    fn missing_wrappers_mean_empty() {
        let graph = parse_family_tree("<familyTree/>").unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn save_emits_one_marriage_per_couple() {
        let graph = parse_family_tree(SAMPLE).unwrap();
        let text = write_family_tree(&graph);
        assert_eq!(text.matches("<marriage ").count(), 1);
        assert!(text.contains(r#"name="Jane &amp; Co""#));
        assert!(text.contains(r#"endDate="2010-06-20""#));
        assert!(!text.contains("endArea"));
        assert!(!text.contains(r#"deathDate="""#));
    }

    #[test]
    fn remarriage_keeps_both_marriages() {
        let mut graph = FamilyGraph::new();
        graph.add_person(Person::new("a", "A")).unwrap();
        graph.add_person(Person::new("b", "B")).unwrap();
        let first = MarriageDetails::started(parse_date("1990-01-01").unwrap())
            .ended(parse_date("1995-01-01").unwrap());
        let second = MarriageDetails::started(parse_date("2000-01-01").unwrap());
        graph.add_marriage("a", "b", first);
        graph.add_marriage("b", "a", second);

        let text = write_family_tree(&graph);
        assert_eq!(text.matches("<marriage ").count(), 2);
        let reloaded = parse_family_tree(&text).unwrap();
        assert_eq!(reloaded.person("a").unwrap().marriages().len(), 2);
    }

    #[test]
    fn round_trip_preserves_people_links_and_marriages() {
        let graph = parse_family_tree(SAMPLE).unwrap();
        let reloaded = parse_family_tree(&write_family_tree(&graph)).unwrap();

        assert_eq!(reloaded.len(), graph.len());
        for person in graph.people() {
            let other = reloaded.person(person.id().as_str()).unwrap();
            assert_eq!(other.display_name(), person.display_name());
            assert_eq!(other.birth_date(), person.birth_date());
            assert_eq!(other.death_date(), person.death_date());
            assert_eq!(other.parent1(), person.parent1());
            assert_eq!(other.parent2(), person.parent2());
            assert_eq!(other.descendants(), person.descendants());
            assert_eq!(other.marriages(), person.marriages());
        }
    }

    #[test]
    fn whitespace_in_attributes_survives_round_trip() {
        let mut graph = FamilyGraph::new();
        graph.add_person(Person::new("1", "Anne\nMarie\tO'Neil\r")).unwrap();
        graph.add_person(Person::new("2", "Bo")).unwrap();
        graph.add_marriage(
            "1",
            "2",
            MarriageDetails::started(parse_date("1990-01-01").unwrap()).at("St.\tIves", "UK\n"),
        );

        let text = write_family_tree(&graph);
        assert!(text.contains("Anne&#10;Marie&#9;O&apos;Neil&#13;"));
        let reloaded = parse_family_tree(&text).unwrap();
        assert_eq!(reloaded.person("1").unwrap().display_name(), "Anne\nMarie\tO'Neil\r");
        let details = reloaded.marriage_with("2", "1").unwrap().details().clone();
        assert_eq!(details.start_area.as_deref(), Some("St.\tIves"));
        assert_eq!(details.start_country.as_deref(), Some("UK\n"));
    }

    #[test]
    fn marriage_order_of_every_spouse_survives_round_trip() {
        let mut graph = FamilyGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_person(Person::new(id, id.to_uppercase())).unwrap();
        }
        graph.add_marriage("b", "c", MarriageDetails::default());
        graph.add_marriage("a", "c", MarriageDetails::default());
        graph.add_marriage("a", "b", MarriageDetails::default());
        assert_eq!(graph.partners("c"), vec![PersonId::from("b"), PersonId::from("a")]);

        let reloaded = parse_family_tree(&write_family_tree(&graph)).unwrap();
        for id in ["a", "b", "c"] {
            assert_eq!(reloaded.partners(id), graph.partners(id), "partners of {id}");
        }
    }

    #[test]
    fn marriages_without_order_attributes_keep_document_order() {
        let text = r#"<familyTree>
    <persons><person id="a"/><person id="b"/><person id="c"/></persons>
    <marriages>
        <marriage spouse1="c" spouse2="a"/>
        <marriage spouse1="b" spouse2="a" spouse2Order="0"/>
    </marriages>
</familyTree>"#;
        let graph = parse_family_tree(text).unwrap();
        assert_eq!(graph.partners("a"), vec![PersonId::from("b"), PersonId::from("c")]);
        assert_eq!(graph.partners("c"), vec![PersonId::from("a")]);
    }

    #[test]
    fn bad_marriage_date_fails_even_when_the_spouse_is_unknown() {
        let text = r#"<familyTree>
    <persons><person id="1" name="A"/></persons>
    <marriages><marriage spouse1="1" spouse2="404" startDate="last spring"/></marriages>
</familyTree>"#;
        assert!(matches!(
            parse_family_tree(text),
            Err(LoadError::Date(err)) if err.text == "last spring"
        ));
    }
}
