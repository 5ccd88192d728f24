use crate::{Link, Topic, TopicCollection};
use once_cell::sync::Lazy;

static FALLBACK: Lazy<TopicCollection> = Lazy::new(|| {
    TopicCollection::new(vec![
        topic(
            "analog",
            "Analog Electronics",
            "Op-amps, filters, amplifiers and signal conditioning for real-world sensors.",
            &[
                (
                    "Op-amp tutorial",
                    "https://www.electronics-tutorials.ws/opamp/opamp_1.html",
                ),
                (
                    "Active filters",
                    "https://www.electronics-tutorials.ws/filter/filter_5.html",
                ),
            ],
        ),
        topic(
            "microcontrollers",
            "Microcontrollers",
            "Arduino, AVR and ARM boards: GPIO, timers, interrupts and serial buses.",
            &[(
                "Getting started with Arduino",
                "https://docs.arduino.cc/learn/starting-guide/getting-started-arduino/",
            )],
        ),
        topic(
            "basics",
            "Electronics Fundamentals",
            "Ohm law, transistors",
            &[("Basics course", "https://example.com")],
        ),
    ])
    .expect("fallback topic ids are unique")
});

/// Built-in collection rendered when the topic document cannot be loaded.
pub fn fallback_collection() -> TopicCollection {
    FALLBACK.clone()
}

fn topic(id: &str, name: &str, description: &str, links: &[(&str, &str)]) -> Topic {
    Topic {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        links: links
            .iter()
            .map(|(title, url)| Link {
                title: title.to_string(),
                url: url.to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_has_three_fixed_topics() {
        let collection = fallback_collection();
        let ids: Vec<_> = collection.topics().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["analog", "microcontrollers", "basics"]);
        assert!(collection.topics().iter().all(|t| !t.links.is_empty()));
    }
}
