pub(crate) mod pathfinding;
