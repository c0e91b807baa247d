pub mod overpass;
