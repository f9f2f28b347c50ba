/// Record vocabulary shared by the generator prompts and the MCP instructions.
pub const SHAPE_TYPES: &str = "\
Every record carries an integer \"id\" (its handle) and a \"type\". Types:\n\
\n\
1. \"geo\": boxes and other outlined shapes.\n\
   {\"id\": 0, \"type\": \"geo\", \"x\": 100, \"y\": 150, \"props\": {\"w\": 240, \"h\": 120, \"geo\": \"rectangle\", \
\"text\": \"Label\", \"color\": \"blue\", \"fill\": \"semi\", \"dash\": \"draw\"}}\n\
   geo: rectangle, ellipse, diamond, cloud, hexagon, octagon, star, triangle, oval, pentagon, trapezoid, rhombus, \
heart, x-box, check-box, arrow-left, arrow-right, arrow-up, arrow-down\n\
   color: black, grey, blue, light-blue, green, light-green, red, light-red, orange, yellow, violet, light-violet, white\n\
   fill: none, semi, solid, pattern\n\
   dash: draw, solid, dashed, dotted\n\
\n\
2. \"arrow\": a connector between two shapes, referenced by id in \"from\" and \"to\". \
No x/y needed; arrows attach to their shapes.\n\
   {\"id\": 3, \"type\": \"arrow\", \"props\": {\"from\": 0, \"to\": 1, \"text\": \"calls\", \"dash\": \"solid\"}}\n\
\n\
3. \"text\": a free-standing label.\n\
   {\"id\": 4, \"type\": \"text\", \"x\": 100, \"y\": 30, \"props\": {\"text\": \"Title\", \"size\": \"xl\"}}\n\
   size: s, m, l, xl\n\
\n\
4. \"note\": a sticky note.\n\
   {\"id\": 5, \"type\": \"note\", \"x\": 100, \"y\": 150, \"props\": {\"text\": \"Remember this\", \"color\": \"yellow\"}}\n";

/// Layout and output rules appended to every generator prompt.
pub const LAYOUT_RULES: &str = "\
Rules:\n\
- Ids are unique integers. Arrows reference shapes by id in \"from\"/\"to\", never by coordinates.\n\
- Arrow labels are a single word (\"calls\", \"reads\", \"HTTP\").\n\
- Shapes never overlap. Keep at least 550px between columns and 450px between rows.\n\
- Place shapes on the grid: columns x=100, 650, 1200, 1750 and rows y=150, 600, 1050, 1500. \
Extend with x=2300, 2850 and y=1950, 2400 when those are taken.\n\
- Only connect grid neighbours; an arrow must not pass over another shape.\n\
- Boxes are about 240x120. Keep labels to 3-4 words per line, details in parentheses on a second line.\n\
- Services are rectangles, data stores ellipses, decisions diamonds, external systems clouds.\n\
- Geo shapes use \"dash\": \"draw\" and \"fill\": \"semi\"; arrows use \"dash\": \"solid\".\n\
- Put a title text at the top (y=30).\n\
- Output ONLY a JSON array of records. No markdown fences, no commentary.\n";

/// How to address existing content when a diagram is not empty.
pub const EDIT_RULES: &str = "\
Each record also carries an \"action\":\n\
- \"add\": create a record. New ids start at the next free id given below.\n\
- \"edit\": change an existing record by id. Include only the props that change, \
e.g. {\"id\": 2, \"action\": \"edit\", \"props\": {\"color\": \"red\"}}.\n\
- \"delete\": remove an existing record by id, e.g. {\"id\": 5, \"action\": \"delete\"}. \
Arrows attached to a deleted shape go with it.\n\
Do not re-create records that already exist and do not repeat untouched ones. \
Arrow endpoints cannot be edited; delete the arrow and add a new one instead.\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Geo;

    #[test]
    fn documented_geo_names_all_parse() {
        let line = SHAPE_TYPES
            .lines()
            .find(|l| l.trim_start().starts_with("geo:"))
            .unwrap();
        let names = line.trim_start().trim_start_matches("geo:");
        for name in names.split(',') {
            assert!(
                crate::parse_token::<Geo>(name).is_some(),
                "undocumented geo {:?}",
                name
            );
        }
    }
}
