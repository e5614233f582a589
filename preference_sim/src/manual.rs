/*!

This is the long-form manual for `preference_sim` and `seatsim`.

## The model

The simulation covers a single-seat preferential contest between four
candidates: the three major parties `ALP`, `LIB` and `GRN`, plus `OTH`, a
bucket for every minor party and independent combined. Two inputs drive it:

* the primary vote of the three majors, in percent of the formal vote (the
  `OTH` primary is the remainder to 100);
* the preference flows, each the percentage of a party's voters that put a
  given other party ahead of the alternatives.

Voters are not modelled individually. Each party's primary vote is expanded
into a handful of full-ranking ballot patterns:

* `ALP` voters split between `ALP > GRN > LIB > OTH` and
  `ALP > LIB > GRN > OTH` according to `alp_to_grn`. `LIB` and `GRN` voters
  are handled the same way with their own flows. Major-party voters always
  rank `OTH` last.
* `OTH` voters split three ways according to `oth_to_alp`, `oth_to_grn` and
  `oth_to_lib`. After their preferred major, the remaining majors follow
  that major's own flow.

Pattern weights are integers. Rounding uses a largest-remainder scheme so
that every party's patterns add up to its exact share of the electorate, and
the `OTH` split tolerates totals within a percent of 100 without rescaling.

The count then proceeds as in an instant-runoff election: the candidate with
the fewest first preferences is eliminated each round and their ballots move
to the next surviving preference, until two candidates remain. The result is
the two-candidate split reported by election-night broadcasts.

## Scenario files

`seatsim` reads a scenario from a JSON file:

```text
{
  "primaries": {
    "alp": 31.8,
    "lib": 29.0,
    "grn": 29.7
  },
  "preferenceFlows": {
    "alpToGrn": 83,
    "libToGrn": 29,
    "grnToAlp": 88,
    "othToAlp": 18,
    "othToGrn": 33,
    "othToLib": 49
  },
  "rules": {
    "totalVotes": 100000,
    "tiebreakMode": "useCandidateOrder"
  }
}
```

* `primaries` is mandatory. Each value must lie in `[0, 100]` and the three
  together must not exceed 100. A party with a zero primary does not contest
  the seat.
* `preferenceFlows` is optional and defaults to the 2022 calibration values
  shown above. Only the six flows listed are accepted: the complements
  (for example `ALP` voters preferring `LIB`) are derived.
* `rules` is optional. `totalVotes` defaults to 100000. `tiebreakMode`
  accepts `useCandidateOrder` (default) or `random`; with `random`, add a
  `randomSeed` field holding the seed as a string (for example `"42"`).
* an optional `outputSettings` block with `contestName`, `contestDate` and
  `jurisdiction` is echoed back in the header of the summary.

## Calibration

The default flows come from the 2022 federal election and the nearby
Victorian state contests: about 83% of ALP voters preference GRN over LIB,
29% of LIB voters preference GRN over ALP and 88% of GRN voters preference
ALP over LIB. The OTH split (18/33/49 to ALP/GRN/LIB) reflects a
right-leaning minor-party field. These are starting points, not forecasts:
the interesting use of the tool is sweeping the flows to find the tipping
points of a seat.

*/
